pub mod forwarder;
pub mod gateway;
pub mod pipeline;
pub mod request;
pub mod response;
pub mod router;
