#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Pothole map API server binary.
//!
//! Configuration comes from the environment; see
//! [`pothole_map_server::ServerConfig`].

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    pothole_map_server::run_server().await
}
