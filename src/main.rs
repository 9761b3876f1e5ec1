// src/main.rs
use std::collections::HashMap;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use diabetes_lib::{
    prediction::{predict_and_record, PredictionContext, PredictionLog},
    utils::{
        config::PredictorConfig,
        env::{load_env, report_env},
    },
    PredictionError,
};
use log::{info, warn};
use serde_json::{json, Map, Value as JsonValue};

#[derive(Parser)]
#[command(author, version, about = "Diabetes risk prediction over pre-trained models", long_about = None)]
struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Score one observation
    Predict(PredictArgs),
    /// List model selectors ("best" plus every loaded model)
    Models,
    /// Print the metrics table used for auto-selection
    Metrics,
    /// Print stored feature importances per model
    Importances,
    /// Print a user's prediction history
    History {
        #[arg(long)]
        user_id: i64,
    },
    /// Print a user's prediction counts
    Stats {
        #[arg(long)]
        user_id: i64,
    },
}

/// Raw values are kept as strings so they go through the same validation as
/// form submissions.
#[derive(Args)]
struct PredictArgs {
    #[arg(long)]
    pregnancies: Option<String>,
    #[arg(long)]
    glucose: Option<String>,
    #[arg(long)]
    blood_pressure: Option<String>,
    #[arg(long)]
    skin_thickness: Option<String>,
    #[arg(long)]
    insulin: Option<String>,
    #[arg(long)]
    bmi: Option<String>,
    #[arg(long)]
    diabetes_pedigree_function: Option<String>,
    #[arg(long)]
    age: Option<String>,

    /// Model name, or "best"
    #[arg(long, default_value = "best")]
    model: String,

    #[arg(long)]
    user_id: Option<i64>,
    #[arg(long)]
    username: Option<String>,
}

impl PredictArgs {
    fn to_form(&self) -> HashMap<String, String> {
        let fields = [
            ("Pregnancies", &self.pregnancies),
            ("Glucose", &self.glucose),
            ("BloodPressure", &self.blood_pressure),
            ("SkinThickness", &self.skin_thickness),
            ("Insulin", &self.insulin),
            ("BMI", &self.bmi),
            ("DiabetesPedigreeFunction", &self.diabetes_pedigree_function),
            ("Age", &self.age),
        ];
        let mut form: HashMap<String, String> = fields
            .into_iter()
            .filter_map(|(name, value)| value.clone().map(|v| (name.to_string(), v)))
            .collect();
        form.insert("model".to_string(), self.model.clone());
        form
    }
}

fn print_json(value: &JsonValue) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to render output")?
    );
    Ok(())
}

fn print_request_error(err: &PredictionError) -> Result<ExitCode> {
    warn!("Request rejected: {}", err);
    print_json(&err.to_response())?;
    Ok(ExitCode::FAILURE)
}

async fn run_predict(
    ctx: Arc<PredictionContext>,
    config: &PredictorConfig,
    args: PredictArgs,
) -> Result<ExitCode> {
    let form = args.to_form();
    let log = config
        .prediction_log_enabled
        .then(|| PredictionLog::new(&config.prediction_log_path));
    let result =
        match predict_and_record(&ctx, &form, log.as_ref(), args.user_id, args.username).await {
            Ok(result) => result,
            Err(e) => return print_request_error(&e),
        };

    print_json(&serde_json::to_value(&result)?)?;
    Ok(ExitCode::SUCCESS)
}

fn load_context(config: &PredictorConfig) -> Result<Arc<PredictionContext>> {
    let ctx =
        PredictionContext::load(config).context("Failed to initialise prediction context")?;
    info!(
        "Prediction context ready: {} models, preprocessor {}",
        ctx.registry().len(),
        if ctx.preprocessor().is_some() {
            "loaded"
        } else {
            "missing"
        }
    );
    Ok(Arc::new(ctx))
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let env_result = load_env();
    let cli = Cli::parse();

    let mut logger = env_logger::Builder::from_default_env();
    if cli.verbose {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.init();
    report_env(env_result);

    let config = PredictorConfig::from_env();
    config.log_config();

    match cli.command {
        Command::Predict(args) => {
            let ctx = load_context(&config)?;
            run_predict(ctx, &config, args).await
        }
        Command::Models => {
            let ctx = load_context(&config)?;
            print_json(&json!(ctx.available_models()))?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Metrics => {
            let ctx = load_context(&config)?;
            match ctx.metrics() {
                Ok(table) => {
                    print_json(&table.as_json())?;
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => print_request_error(&e),
            }
        }
        Command::Importances => {
            let ctx = load_context(&config)?;
            let importances: Map<String, JsonValue> = ctx
                .feature_importances()
                .into_iter()
                .map(|(name, values)| (name, json!(values)))
                .collect();
            print_json(&JsonValue::Object(importances))?;
            Ok(ExitCode::SUCCESS)
        }
        Command::History { user_id } => {
            let log = PredictionLog::new(&config.prediction_log_path);
            let history = log.history_for_user(user_id).await?;
            print_json(&serde_json::to_value(history)?)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Stats { user_id } => {
            let log = PredictionLog::new(&config.prediction_log_path);
            let stats = log.stats_for_user(user_id).await?;
            print_json(&serde_json::to_value(stats)?)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
