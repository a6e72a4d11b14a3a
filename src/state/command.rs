use bytes::Bytes;

/// A named command to be applied to the state machine. The name selects the
/// command type on the receiving side; the body is opaque to the log.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Command {
    #[prost(string, tag = "1")]
    name: String,
    #[prost(bytes = "bytes", tag = "2")]
    body: Bytes,
}

impl Command {
    pub fn new(name: String, body: Bytes) -> Self {
        Command { name, body }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }
}
