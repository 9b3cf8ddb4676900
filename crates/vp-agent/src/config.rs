use std::net::SocketAddr;
use std::path::PathBuf;

/// Everything a device agent needs to know about its surroundings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub server_url: String,
    /// The location this device belongs to. Requests raised here start the
    /// continuous alarm; requests from elsewhere become notifications.
    pub location: String,
    pub data_dir: PathBuf,
    /// Player command fed a WAV on stdin, e.g. `aplay -q`. Without one the
    /// alert is only logged.
    pub sound_command: Option<String>,
    /// Command used to show desktop notifications, e.g. `notify-send`.
    pub notify_command: Option<String>,
    /// Where this agent listens for server pushes.
    pub push_listen: Option<SocketAddr>,
    /// Endpoint registered with the server. Defaults to the listen address.
    pub push_endpoint: Option<String>,
}

impl AgentConfig {
    pub fn new(server_url: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into().trim_end_matches('/').to_string(),
            location: location.into(),
            data_dir: PathBuf::from(".valet/agent"),
            sound_command: None,
            notify_command: None,
            push_listen: None,
            push_endpoint: None,
        }
    }

    pub fn resolved_push_endpoint(&self) -> Option<String> {
        self.push_endpoint
            .clone()
            .or_else(|| self.push_listen.map(|addr| format!("http://{addr}/push")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_endpoint_falls_back_to_listen_address() {
        let mut config = AgentConfig::new("http://localhost:4820/", "Pier 9");
        assert_eq!(config.server_url, "http://localhost:4820");
        assert!(config.resolved_push_endpoint().is_none());

        config.push_listen = Some("127.0.0.1:4821".parse().unwrap());
        assert_eq!(
            config.resolved_push_endpoint().as_deref(),
            Some("http://127.0.0.1:4821/push")
        );
        config.push_endpoint = Some("https://pier9.example/push".to_string());
        assert_eq!(
            config.resolved_push_endpoint().as_deref(),
            Some("https://pier9.example/push")
        );
    }
}
