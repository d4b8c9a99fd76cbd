//! `MaveCaptcha` demo - headless render and validate loop.
//!
//! Copyright (C) 2026 Maverick
//! SPDX-License-Identifier: AGPL-3.0-only
//!
//! Loads configuration from the environment (or `.env`), sets up logging,
//! generates a code, lets the deferred rasterization run, writes the image to
//! `CAPTCHA_OUT` (default `captcha.png`), then validates lines from stdin.

use mavecaptcha::logging::{self, LogFormat};
use mavecaptcha::{CaptchaConfig, CaptchaController, ChangeEvent, ValidationResult};
use std::io::BufRead;
use tracing::{info, warn};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let _guard = logging::init(LogFormat::from_env()).map_err(|e| e.to_string())?;

    let config = match CaptchaConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "Falling back to a 200x60 canvas");
            CaptchaConfig::new(200.0, 60.0)
        }
    };
    info!(
        width = config.width,
        height = config.height,
        length = config.length,
        case_sensitive = config.case_sensitive,
        "Captcha demo initialized"
    );

    let mut controller = CaptchaController::new(config)?
        .on_code_generated(|code| info!(%code, "Generated code"));
    controller.subscribe(|event| {
        if let ChangeEvent::Rendered { serial, has_image } = event {
            info!(serial, has_image, "Image settled");
        }
    })?;

    let out = std::env::var("CAPTCHA_OUT").unwrap_or_else(|_| "captcha.png".to_string());
    refresh_and_write(&mut controller, &out)?;

    println!("Type the code from {out} (empty line for a new code, Ctrl-D to quit):");
    for line in std::io::stdin().lock().lines() {
        let line = line?;
        if line.is_empty() {
            refresh_and_write(&mut controller, &out)?;
            continue;
        }
        match controller.validate(line.trim())? {
            ValidationResult::Valid => println!("valid"),
            ValidationResult::InvalidCode => println!("invalid code, try again"),
            ValidationResult::CodeExpired => {
                println!("code expired, generating a new one");
                refresh_and_write(&mut controller, &out)?;
            }
        }
    }

    controller.dispose();
    Ok(())
}

fn refresh_and_write(
    controller: &mut CaptchaController,
    out: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    controller.refresh()?;
    let settle = controller.config().settle_delay;
    if !settle.is_zero() {
        std::thread::sleep(settle);
    }
    controller.run_deferred();

    match controller.image() {
        Some(image) => {
            std::fs::write(out, image.to_png()?)?;
            info!(path = %out, "Captcha image written");
        }
        None => warn!("No image available for the current code"),
    }
    Ok(())
}
