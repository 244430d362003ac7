//! Campaign Runner Example
//!
//! Runs (or resumes) an anchoring campaign for one model and prints the
//! high-vs-low anchor comparison.
//!
//! Run with:
//!   OPENAI_API_KEY=... cargo run --example run_campaign -- \
//!       demos/sentencing.json openai/gpt-4o 30 results.jsonl [--sacd]
//!
//! Set `RUST_LOG=anchorlab=debug` to see parser rules and SACD transitions.

use anyhow::{bail, Context};
use tracing_subscriber::EnvFilter;

use anchorlab::config::ProviderConfig;
use anchorlab::experiment::ExperimentDefinition;
use anchorlab::sacd::SacdConfig;
use anchorlab::scheduler::{run_campaign, CampaignConfig, TrialMode};
use anchorlab::sink::{JsonlSink, TrialSink};
use anchorlab::stats::{compare_samples, numeric_observations, BootstrapConfig};
use anchorlab::Provider;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("anchorlab=info")),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 4 {
        bail!("usage: run_campaign <experiment.json> <backend/model> <trials> <out.jsonl> [--sacd]");
    }
    let experiment = ExperimentDefinition::from_path(&args[0])
        .with_context(|| format!("loading experiment {}", args[0]))?;
    let requested_model = &args[1];
    let trials: usize = args[2].parse().context("trials must be a number")?;
    let mut sink = JsonlSink::new(&args[3]).with_sync(true);

    let mode = if args.iter().any(|a| a == "--sacd") {
        TrialMode::Sacd(SacdConfig::default())
    } else {
        TrialMode::Direct
    };
    let provider = ProviderConfig::from_env(requested_model)?.temperature(0.7).build()?;
    // Records are keyed by the normalised identifier, not the raw argument.
    let model_id = provider.model_id();
    let config = CampaignConfig::builder().mode(mode).build();

    println!("=== Anchorlab Campaign ===\n");
    println!("   Experiment: {} ({})", experiment.name(), experiment.id());
    println!("   Model:      {model_id}");
    println!("   Trials:     {trials} per condition\n");

    let report = run_campaign(&experiment, trials, &provider, &mut sink, &config).await?;

    for condition in &report.conditions {
        println!(
            "   {:<20} existing={:<3} executed={:<3} errors={:<3} n={:<3} mean={:.2} median={:.2}",
            condition.condition_id,
            condition.existing,
            condition.executed,
            condition.errors,
            condition.summary.n,
            condition.summary.mean,
            condition.summary.five.median,
        );
    }

    let conditions = experiment.conditions();
    if conditions.len() == 2 {
        let high = numeric_observations(&sink.records(model_id, conditions[1].id())?);
        let low = numeric_observations(&sink.records(model_id, conditions[0].id())?);
        if !high.is_empty() && !low.is_empty() {
            let cmp = compare_samples(&high, &low, &BootstrapConfig::default())?;
            println!(
                "\n   {} - {}: {:.2} [{:.2}, {:.2}] ({:.0}% CI)",
                conditions[1].id(),
                conditions[0].id(),
                cmp.difference.point_estimate,
                cmp.difference.lower,
                cmp.difference.upper,
                cmp.difference.confidence_level * 100.0,
            );
            println!(
                "   Welch t = {:.3}, df = {:.1}, p = {:.4}, Hedges' g = {:.2}",
                cmp.t_test.t, cmp.t_test.df, cmp.t_test.p_value, cmp.effect.hedges_g
            );
        }
    }

    println!("\n=== Done ===");
    Ok(())
}
