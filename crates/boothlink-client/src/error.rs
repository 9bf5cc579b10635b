use boothlink_common::ProtocolError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("not connected to the relay")]
    NotConnected,

    #[error("outbound queue is full")]
    QueueFull,

    #[error("session client has shut down")]
    Closed,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
