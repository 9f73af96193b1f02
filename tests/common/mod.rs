//! Common test utilities for diagram-dl integration tests

#![allow(dead_code)]

use diagram_dl::{Config, DiagramSpec};
use std::path::Path;
use std::time::Duration;
use wiremock::MockServer;

/// Minimal body that passes the PNG signature check, padded past the size heuristic
pub fn png_body(len: usize) -> Vec<u8> {
    let mut body = b"\x89PNG\r\n\x1a\n".to_vec();
    body.resize(len.max(body.len()), 0xAB);
    body
}

/// Config pointed at a mock server, with millisecond delays
pub fn config_for(server: &MockServer, output_dir: &Path) -> Config {
    let mut config = Config {
        render_base_url: format!("{}/plantuml", server.uri()),
        output_dir: output_dir.to_path_buf(),
        request_delay: Duration::from_millis(10),
        ..Default::default()
    };
    config.retry.initial_delay = Duration::from_millis(20);
    config.http.timeout = Duration::from_secs(5);
    config
}

/// Three small diagrams with distinct sources
pub fn three_specs() -> Vec<DiagramSpec> {
    vec![
        DiagramSpec::new(
            "01_Overview",
            "@startuml\ntitle Overview\nrectangle A\nrectangle B\nA -r-> B\n@enduml",
        ),
        DiagramSpec::new(
            "02_Flow",
            "@startuml\ntitle Flow\nstart\n:Menu;\n:Play;\nstop\n@enduml",
        ),
        DiagramSpec::new(
            "03_States",
            "@startuml\n[*] --> Idle\nIdle --> Running\nRunning --> [*]\n@enduml",
        ),
    ]
}
