use mavecaptcha::{
    Alphabet, CaptchaConfig, CaptchaController, CaptchaRenderer, CaptchaSession, ManualClock,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use std::time::Duration;

/// Config from the documented walkthrough: `ABC123`, length 4, one minute expiry.
pub fn scenario_config() -> CaptchaConfig {
    let mut config = CaptchaConfig::new(160.0, 50.0);
    config.alphabet = Alphabet::new("ABC123").unwrap();
    config.length = 4;
    config.case_sensitive = false;
    config.expire_after = Duration::from_secs(60);
    config
}

/// Controller on a manual clock with seeded randomness.
pub fn create_controller(config: CaptchaConfig, seed: u64) -> (CaptchaController, ManualClock) {
    let config = Arc::new(config);
    let clock = ManualClock::default();
    let session = CaptchaSession::with_parts(
        Arc::clone(&config),
        clock.clone(),
        StdRng::seed_from_u64(seed),
    )
    .unwrap();
    let renderer = CaptchaRenderer::with_rng(config, StdRng::seed_from_u64(seed + 1)).unwrap();
    (CaptchaController::from_parts(session, renderer), clock)
}
