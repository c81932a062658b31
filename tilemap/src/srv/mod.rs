mod admin;
mod params;
mod policy;
mod wms;
mod wmts;

mod server;
pub use server::{new_server, router};

pub use params::OgcParams;
pub use policy::{ExceptionPolicy, WmsPolicy, WmtsPolicy};
