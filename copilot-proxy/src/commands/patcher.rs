//! `patcher`: out of scope (§1). Exists so the subcommand surface matches §6/§10.L.

use std::path::Path;

pub async fn run(target: &Path) -> anyhow::Result<()> {
    log::warn!(target = target.display().to_string(); "patching a third-party client's bundled JavaScript is not implemented by this build");
    anyhow::bail!("`patcher` is not implemented; point the target client at this proxy's base URL manually");
}
