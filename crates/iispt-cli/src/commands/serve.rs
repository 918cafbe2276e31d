//! Stdio inference server command.

use anyhow::{Context, Result};
use iispt::serve::{InferenceServer, Passthrough, ServeConfig, ServeMode};

pub fn run(resolution: usize, mode: ServeMode, blur_sigma: f32) -> Result<()> {
    let config = ServeConfig::default()
        .resolution(resolution)
        .mode(mode)
        .blur_sigma(blur_sigma);

    if mode == ServeMode::Inference {
        tracing::warn!("no network backend is linked into this binary; serving passthrough predictions");
    }

    let mut server =
        InferenceServer::new(config, Passthrough).context("Invalid server configuration")?;

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let result = server.run(&mut stdin.lock(), &mut stdout.lock());

    let frames = server.frames();
    match result {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::error!(frames, "fatal: {e}");
            Err(e).context(format!("Inference server stopped after {frames} frames"))
        }
    }
}
