use std::{env, path::Path, process::ExitCode, sync::Arc};

use aiwidget::{
    cli::{self, Command},
    config::service::parse_base_url,
    Dashboard, HttpGenerationService, JobOrchestrator, JobSnapshot, SandboxExecutor,
    ServiceConfig,
};
use anyhow::{anyhow, Context, Result};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let _ = fmt().with_env_filter(EnvFilter::from_default_env()).try_init();
    if let Err(err) = dotenvy::dotenv() {
        tracing::debug!(target = "aiwidget", "no .env loaded: {err}");
    }

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(target = "aiwidget", "aiwidget: {err:?}");
            eprintln!("aiwidget: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let command = match cli::parse_args(&args) {
        Ok(command) => command,
        Err(err) => {
            eprintln!("{}", cli::usage());
            return Err(err);
        }
    };
    let config = ServiceConfig::from_env();

    match command {
        Command::Help => {
            println!("{}", cli::usage());
            Ok(())
        }
        Command::Compile { file, export } => {
            let source = cli::read_source(&file)?;
            let export = export.unwrap_or_else(|| config.export_name.clone());
            let compiler = aiwidget::SourceCompiler::new();
            let module = compiler.compile(&source, &export).map_err(|err| match err.location() {
                Some(location) => anyhow!("{}\n{location}", err.message),
                None => anyhow!("{}", err.message),
            })?;
            println!("{}", module.executable_body());
            Ok(())
        }
        Command::Render {
            file,
            export,
            dark,
            out,
        } => {
            let export = export.unwrap_or_else(|| config.export_name.clone());
            let html = cli::render_file(&file, &export, &config, dark)?;
            match out {
                Some(path) => cli::write_page(&path, &html),
                None => {
                    println!("{html}");
                    Ok(())
                }
            }
        }
        Command::Generate {
            base_url,
            out,
            dark,
            show_details,
        } => {
            let mut config = config;
            if let Some(raw) = base_url {
                config.base_url = parse_base_url(&raw).context("invalid --base-url")?;
            }
            generate(config, &out, dark, show_details).await
        }
    }
}

async fn generate(config: ServiceConfig, out: &Path, dark: bool, show_details: bool) -> Result<()> {
    let service = HttpGenerationService::from_config(&config).context("failed to build HTTP client")?;
    let orchestrator = JobOrchestrator::new(Arc::new(service), config.poll_interval);
    let mut dashboard = Dashboard::new(orchestrator.clone(), SandboxExecutor::default(), &config);
    dashboard.set_dark_mode(dark);
    dashboard.set_show_details(show_details);

    tracing::info!(
        target = "aiwidget",
        base_url = %config.base_url,
        export = %config.export_name,
        "starting widget generation"
    );

    let mut updates = orchestrator.subscribe();
    dashboard.generate();
    loop {
        let snapshot: JobSnapshot = updates.borrow_and_update().clone();
        cli::write_page(out, &dashboard.render_page(&snapshot))?;

        if snapshot.phase.is_terminal() {
            tracing::info!(target = "aiwidget", page = %out.display(), widgets = dashboard.widget_count(), "job finished");
            return Ok(());
        }
        if let Some(err) = &snapshot.start_error {
            return Err(anyhow!("{err} ({})", err.detail));
        }
        if updates.changed().await.is_err() {
            return Err(anyhow!("job orchestrator stopped unexpectedly"));
        }
    }
}
