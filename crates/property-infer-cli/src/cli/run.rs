use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use property_infer::engine::{PropertyInferenceConfig, RunResults, Verdict};
use property_infer::feedback::{HttpOracle, NullOracle};
use property_infer::fut::ComparisonStrategy;
use property_infer::properties;
use serde::Deserialize;

use super::GlobalOptions;
use super::demo_futs;

/// Runs property inference over the bundled demo FUTs and writes the
/// spec's Results schema as JSON (spec §6). A TOML config file supplies
/// the knobs `PropertyInferenceConfig::configure` exposes; any flag given
/// on the command line overrides the matching config value.
#[derive(Debug, clap::Parser)]
pub(super) struct RunCommand {
    /// TOML file deserializing to the run configuration below. Omit to
    /// use the engine's defaults.
    #[clap(long)]
    config: Option<PathBuf>,

    /// Where to write the JSON results. Defaults to stdout.
    #[clap(long, short)]
    output: Option<PathBuf>,

    /// Only run the named demo FUTs (comma-separated). Defaults to all.
    #[clap(long, value_delimiter = ',')]
    futs: Option<Vec<String>>,

    /// Only evaluate the named properties (comma-separated). Defaults to
    /// every property the registry knows.
    #[clap(long, value_delimiter = ',')]
    properties: Option<Vec<String>>,

    #[clap(long)]
    example_count: Option<usize>,

    #[clap(long)]
    seed: Option<u64>,

    #[clap(long)]
    feedback: Option<bool>,
}

/// Deserialized shape of `--config`, mirroring `configure(...)`'s
/// parameters (spec §4.6) one-for-one plus the CLI-only `oracle_endpoint`
/// that picks `HttpOracle` over `NullOracle`.
#[derive(Debug, Deserialize)]
#[serde(default)]
struct RunConfig {
    example_count: usize,
    max_counterexamples: usize,
    comparison_strategy: ComparisonStrategyConfig,
    use_input_cache: bool,
    feedback_enabled: bool,
    max_feedback_attempts: usize,
    parallel: bool,
    seed: u64,
    property_filter: Option<Vec<String>>,
    oracle_endpoint: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            example_count: 100,
            max_counterexamples: 5,
            comparison_strategy: ComparisonStrategyConfig::FirstCompatible,
            use_input_cache: true,
            feedback_enabled: false,
            max_feedback_attempts: 3,
            parallel: false,
            seed: 0,
            property_filter: None,
            oracle_endpoint: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ComparisonStrategyConfig {
    FirstCompatible,
    Consensus,
    MostRestrictive,
}

impl From<ComparisonStrategyConfig> for ComparisonStrategy {
    fn from(value: ComparisonStrategyConfig) -> Self {
        match value {
            ComparisonStrategyConfig::FirstCompatible => ComparisonStrategy::FirstCompatible,
            ComparisonStrategyConfig::Consensus => ComparisonStrategy::Consensus,
            ComparisonStrategyConfig::MostRestrictive => ComparisonStrategy::MostRestrictive,
        }
    }
}

impl RunCommand {
    pub(super) fn run(self, global_options: GlobalOptions) -> anyhow::Result<()> {
        let mut run_config = match &self.config {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("reading config file {}", path.display()))?;
                toml::from_str(&text).context("parsing config file as TOML")?
            }
            None => RunConfig::default(),
        };
        if let Some(example_count) = self.example_count {
            run_config.example_count = example_count;
        }
        if let Some(seed) = self.seed.or(global_options.random_seed()) {
            run_config.seed = seed;
        }
        if let Some(feedback) = self.feedback {
            run_config.feedback_enabled = feedback;
        }
        if let Some(filter) = &self.properties {
            run_config.property_filter = Some(filter.clone());
        }

        let mut config = PropertyInferenceConfig::new(properties::full())
            .with_example_count(run_config.example_count)
            .with_max_counterexamples(run_config.max_counterexamples)
            .with_comparison_strategy(run_config.comparison_strategy.into())
            .with_input_cache(run_config.use_input_cache)
            .with_parallel(run_config.parallel)
            .with_seed(run_config.seed);

        config = match run_config.oracle_endpoint {
            Some(endpoint) => config.with_feedback(
                run_config.feedback_enabled,
                Box::new(HttpOracle::new(endpoint)),
                run_config.max_feedback_attempts,
            ),
            None => config.with_feedback(
                run_config.feedback_enabled,
                Box::new(NullOracle),
                run_config.max_feedback_attempts,
            ),
        };

        if let Some(names) = run_config.property_filter {
            config = config.with_property_filter(names);
        }

        let selected_futs = demo_futs::all()
            .into_iter()
            .filter(|fut| self.futs.as_ref().is_none_or(|names| names.iter().any(|n| n == fut.name)));
        for fut in selected_futs {
            config = config.with_fut(fut.name, fut.spec, fut.grammar);
        }

        let results = config.run();
        let rendered = render_results(&results);

        match self.output {
            Some(path) => {
                let file = fs::File::create(&path)
                    .with_context(|| format!("creating output file {}", path.display()))?;
                serde_json::to_writer_pretty(file, &rendered).context("writing JSON results")?;
            }
            None => {
                serde_json::to_writer_pretty(std::io::stdout(), &rendered).context("writing JSON results")?;
                println!();
            }
        }
        Ok(())
    }
}

/// Renders [`RunResults`] as the spec §6 Results schema. Kept as a manual
/// `serde_json::Value` build rather than `#[derive(Serialize)]` on the
/// engine's internal types, since the wire shape ("witnesses" render as
/// plain strings) differs from their in-memory representation — the
/// engine's types are "consumed, not specified" by this boundary (spec
/// §6).
fn render_results(results: &RunResults) -> serde_json::Value {
    let mut futs = serde_json::Map::new();
    for (fut_name, fut_results) in results {
        let mut outcomes = serde_json::Map::new();
        for (property_name, verdict) in &fut_results.outcomes {
            outcomes.insert(property_name.clone(), render_verdict(verdict));
        }
        let mut constraints_history = serde_json::Map::new();
        for (property_name, history) in &fut_results.constraints_history {
            constraints_history.insert(property_name.clone(), serde_json::json!(history));
        }
        futs.insert(
            fut_name.clone(),
            serde_json::json!({
                "outcomes": outcomes,
                "constraints_history": constraints_history,
            }),
        );
    }
    serde_json::Value::Object(futs)
}

fn render_verdict(verdict: &Verdict) -> serde_json::Value {
    match verdict {
        Verdict::Evaluated(outcome) => serde_json::json!({
            "holds": outcome.holds,
            "successes": outcome.successes.iter().map(|w| &w.input).collect::<Vec<_>>(),
            "counterexamples": outcome.counterexamples.iter().map(|w| &w.input).collect::<Vec<_>>(),
            "stats": {
                "total_count": outcome.stats.total_count,
                "success_count": outcome.stats.success_count,
            },
        }),
        Verdict::Inconclusive { reason } => serde_json::json!({
            "holds": false,
            "successes": [],
            "counterexamples": [],
            "stats": { "total_count": 0, "success_count": 0 },
            "inconclusive_reason": reason,
        }),
    }
}
