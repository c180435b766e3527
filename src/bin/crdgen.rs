//! # CRD Generator
//!
//! Prints the `RegistryAuth` CustomResourceDefinition as YAML.
//!
//! ```bash
//! cargo run --bin crdgen > config/crd/registryauth.yaml
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use anyhow::{Context, Result};
use kube::CustomResourceExt;
use registry_auth_controller::crd::RegistryAuth;

fn main() -> Result<()> {
    let yaml = serde_yaml::to_string(&RegistryAuth::crd())
        .context("Failed to serialize RegistryAuth CRD to YAML")?;
    print!("{yaml}");
    Ok(())
}
