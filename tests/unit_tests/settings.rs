use fenris_function::settings::PullbackSettings;

#[test]
fn default_pullback_settings() {
    let settings = PullbackSettings::default();
    assert_eq!(settings.max_iterations, 15);
    assert_eq!(settings.residual_tolerance, 1e-10);
    assert_eq!(settings.containment_tolerance, 1e-12);

    let newton = settings.newton_settings(2.0);
    assert_eq!(newton.max_iterations, Some(15));
    assert_eq!(newton.tolerance, 2e-10);
    assert_eq!(newton.step_tolerance, Some(1e-14));
}

#[test]
fn pullback_settings_deserialize_with_defaults() {
    let settings: PullbackSettings = serde_json::from_str(r#"{ "max_iterations": 30 }"#).unwrap();
    assert_eq!(
        settings,
        PullbackSettings {
            max_iterations: 30,
            ..PullbackSettings::default()
        }
    );

    let json = serde_json::to_string(&settings).unwrap();
    let roundtrip: PullbackSettings = serde_json::from_str(&json).unwrap();
    assert_eq!(roundtrip, settings);
}
