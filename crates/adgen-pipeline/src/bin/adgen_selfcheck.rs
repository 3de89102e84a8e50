use std::path::Path;

use adgen_pipeline::PipelineConfig;
use adgen_services::ServiceConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = PipelineConfig::from_env();
    let services = ServiceConfig::from_env();

    println!(
        "adgen-selfcheck: starting with work_dir={}",
        config.work_dir.display()
    );
    config.validate()?;
    config.ensure_dirs().await?;
    ensure_binaries()?;
    ensure_fallback(&config.fallback_asset)?;
    ensure_env_present(&["REPLICATE_API_TOKEN"])?;

    if services.pexels_api_key.is_none() && services.pixabay_api_key.is_none() {
        println!("adgen-selfcheck: warning: no stock-media provider key set, every segment will use the fallback asset");
    }

    println!("adgen-selfcheck: ok");
    Ok(())
}

fn ensure_binaries() -> anyhow::Result<()> {
    let ffmpeg = adgen_media::check_ffmpeg()?;
    let ffprobe = adgen_media::check_ffprobe()?;
    println!(
        "adgen-selfcheck: ffmpeg={} ffprobe={}",
        ffmpeg.display(),
        ffprobe.display()
    );
    Ok(())
}

fn ensure_fallback(path: &Path) -> anyhow::Result<()> {
    if !path.is_file() {
        return Err(anyhow::anyhow!(
            "fallback asset missing at {}",
            path.display()
        ));
    }
    Ok(())
}

fn ensure_env_present(vars: &[&str]) -> anyhow::Result<()> {
    for var in vars {
        if std::env::var(var).map(|v| v.trim().is_empty()).unwrap_or(true) {
            return Err(anyhow::anyhow!("missing required env var {}", var));
        }
    }
    Ok(())
}
