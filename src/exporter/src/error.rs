use std::net::SocketAddr;

#[derive(thiserror::Error, Debug)]
pub enum ExporterError {
    #[error("Invalid listen address {0}")]
    InvalidAddress(String),

    #[error("Failed to bind metrics endpoint to {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Metrics http server failed: {0}")]
    Serve(#[from] std::io::Error),

    #[error("Unable to send {0} signal for metrics http server")]
    Signal(&'static str),
}
