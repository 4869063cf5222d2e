//! services/api/src/bin/openapi.rs
//!
//! Prints the OpenAPI specification as JSON, for clients that want the spec
//! without running the server.

use api_lib::web::rest::ApiDoc;
use utoipa::OpenApi;

fn main() {
    match serde_json::to_string_pretty(&ApiDoc::openapi()) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Failed to render the OpenAPI spec: {e}");
            std::process::exit(1);
        }
    }
}
