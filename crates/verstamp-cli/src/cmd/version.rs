//! Version command

use anyhow::Result;

use crate::Project;

/// Print the resolved version
pub fn version(project: &Project) -> Result<()> {
    let version = project.resolve()?;
    println!("{version}");
    Ok(())
}
