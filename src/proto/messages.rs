// Message definitions of `echo.proto`, kept in sync by hand:
//
//   message EchoRequest  { int32 op = 1; bytes key = 2; bytes value = 3; }
//   message EchoResponse { int32 status = 1; bytes value = 2; }
//   message RpcRequest   { string method = 1; bytes payload = 2; bytes attachment = 3; }
//   message RpcResponse  { int32 error_code = 1; string error_text = 2;
//                          bytes payload = 3; bytes attachment = 4; }

/// Payload of a call to the `Echo` method
#[derive(Clone, PartialEq, prost::Message)]
pub struct EchoRequest {
    /// Operation code, see `OpCode`
    #[prost(int32, tag = "1")]
    pub op: i32,
    /// Key of the entry
    #[prost(bytes, tag = "2")]
    pub key: Vec<u8>,
    /// Value of the entry, meaningful for writes
    #[prost(bytes, tag = "3")]
    pub value: Vec<u8>,
}

/// Payload of the reply to the `Echo` method
#[derive(Clone, PartialEq, prost::Message)]
pub struct EchoResponse {
    /// Operation status, see `Status`. Zero when no status was set
    #[prost(int32, tag = "1")]
    pub status: i32,
    /// Value returned by a successful read
    #[prost(bytes, tag = "2")]
    pub value: Vec<u8>,
}

/// Envelope of every frame sent to the server
#[derive(Clone, PartialEq, prost::Message)]
pub struct RpcRequest {
    /// Name of the called method
    #[prost(string, tag = "1")]
    pub method: String,
    /// Encoded request message of the method
    #[prost(bytes, tag = "2")]
    pub payload: Vec<u8>,
    /// Bytes carried alongside the payload, never interpreted by the server
    #[prost(bytes, tag = "3")]
    pub attachment: Vec<u8>,
}

/// Envelope of every frame sent back by the server
#[derive(Clone, PartialEq, prost::Message)]
pub struct RpcResponse {
    /// Transport error code, zero on success
    #[prost(int32, tag = "1")]
    pub error_code: i32,
    /// Description of the transport error
    #[prost(string, tag = "2")]
    pub error_text: String,
    /// Encoded response message of the method
    #[prost(bytes, tag = "3")]
    pub payload: Vec<u8>,
    /// Bytes carried alongside the payload
    #[prost(bytes, tag = "4")]
    pub attachment: Vec<u8>,
}
