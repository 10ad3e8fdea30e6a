use diskclone::copy::driver::RunOutcome;
use diskclone::job::{JobConfig, JobRuntime};
use diskclone::logging::init_logging;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CliMode {
    Run,
    Supervise,
    Status,
    Reset,
    Help,
}

fn parse_cli_mode<I>(args: I) -> anyhow::Result<CliMode>
where
    I: IntoIterator<Item = String>,
{
    let mut mode = CliMode::Run;
    for arg in args.into_iter().skip(1) {
        match arg.as_str() {
            "--supervise" => mode = CliMode::Supervise,
            "--status" => mode = CliMode::Status,
            "--reset" => mode = CliMode::Reset,
            "--help" | "-h" => mode = CliMode::Help,
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }
    Ok(mode)
}

fn print_outcome(outcome: &RunOutcome) {
    match outcome {
        RunOutcome::Completed(stats) => println!("copy complete: {stats}"),
        RunOutcome::Rescheduled {
            phase,
            stats,
            run_at,
        } => println!("paused during {phase} phase: {stats}; next run at {run_at}"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let mode = parse_cli_mode(std::env::args())?;
    if mode == CliMode::Help {
        println!("Usage: diskclone [--supervise | --status | --reset]");
        println!("  (none)       Run one time-budgeted execution of the copy job");
        println!("  --supervise  Keep running executions until the copy completes");
        println!("  --status     Print the saved progress of the job and exit");
        println!("  --reset      Forget the saved progress of the job and exit");
        return Ok(());
    }

    let config = JobConfig::from_env()?;
    init_logging(config.log_format)?;
    let runtime = JobRuntime::bootstrap(config).await?;
    match mode {
        CliMode::Run => print_outcome(&runtime.run_once().await?),
        CliMode::Supervise => print_outcome(&runtime.supervise().await?),
        CliMode::Status => println!("{}", runtime.status().await?),
        CliMode::Reset => {
            if runtime.reset().await? {
                println!("saved progress removed");
            } else {
                println!("no saved progress");
            }
        }
        CliMode::Help => {}
    }
    Ok(())
}
