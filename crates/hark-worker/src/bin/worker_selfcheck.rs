use std::path::Path;

use hark_media::{check_ffmpeg, check_tool};
use hark_worker::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = WorkerConfig::from_env()?;

    println!(
        "worker-selfcheck: starting with work_dir={}",
        config.work_dir
    );
    ensure_workdir(&config.work_dir).await?;
    check_ffmpeg()?;
    check_tool(&config.whisper_bin)?;
    ensure_model(&config.whisper_model)?;
    ensure_env_present(&["TASK_QUEUE_URL"])?;

    println!("worker-selfcheck: ok");
    Ok(())
}

async fn ensure_workdir<P: AsRef<Path>>(path: P) -> anyhow::Result<()> {
    let path = path.as_ref();
    tokio::fs::create_dir_all(path).await?;
    Ok(())
}

fn ensure_model(path: &str) -> anyhow::Result<()> {
    if !Path::new(path).exists() {
        return Err(anyhow::anyhow!("model file {} not found", path));
    }
    Ok(())
}

fn ensure_env_present(vars: &[&str]) -> anyhow::Result<()> {
    for var in vars {
        if std::env::var(var).is_err() {
            return Err(anyhow::anyhow!("missing required env var {}", var));
        }
    }
    Ok(())
}
