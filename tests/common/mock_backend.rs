use mockito::Server;
use url::Url;

/// mockito backend on a freshly allocated port
///
/// Core infrastructure only: the mocks themselves are declared in the test
/// files that use them.
pub struct MockBackend {
    pub server: mockito::Server,
}

impl MockBackend {
    /// Start a backend on an ephemeral port
    pub async fn start() -> anyhow::Result<Self> {
        let port = restcheck::allocate_port()?;
        Ok(Self::new_with_port(port).await)
    }

    /// Start a backend on a specific port
    pub async fn new_with_port(port: u16) -> Self {
        let opts = mockito::ServerOpts {
            port,
            ..Default::default()
        };
        let server = Server::new_with_opts_async(opts).await;
        Self { server }
    }

    /// Base URL of the backend
    pub fn base_url(&self) -> Url {
        Url::parse(&self.server.url()).expect("mockito serves a valid URL")
    }
}
