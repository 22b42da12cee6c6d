//! Prints the ByoHost CRD manifest as YAML.

use crds::ByoHost;
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&ByoHost::crd())?);
    Ok(())
}
