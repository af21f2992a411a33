//! Generate CRD YAML for the provider's custom resources.

fn main() -> anyhow::Result<()> {
    print!("{}", provider_dummymessageservice::crds_yaml()?);
    Ok(())
}
