//! Release composition command description.
//!
//! The description is the pipeline's final artifact. Running it is left to a
//! [`ReleaseComposer`](crate::adapters::ReleaseComposer).

use super::merger::FinalMapping;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Structured `oc adm release new` invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseCommand {
    pub from_release: String,
    /// Set when the release-root component was rebuilt.
    pub to_image_base: Option<String>,
    /// `(component, image)` pairs in manifest order.
    pub mappings: Vec<(String, String)>,
    pub to_image: String,
    pub keep_manifest_list: bool,
    pub allow_missing_images: bool,
}

/// Describe the composition of `mapping` on top of `base_release`.
pub fn build_release_command(
    mapping: &FinalMapping,
    base_release: &str,
    output_release: &str,
    base_image_override: Option<&str>,
) -> ReleaseCommand {
    ReleaseCommand {
        from_release: base_release.to_string(),
        to_image_base: base_image_override.map(str::to_string),
        mappings: mapping
            .entries()
            .iter()
            .map(|e| (e.component.clone(), e.image.clone()))
            .collect(),
        to_image: output_release.to_string(),
        keep_manifest_list: true,
        allow_missing_images: true,
    }
}

impl ReleaseCommand {
    /// Arguments following the `oc` binary.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "adm".to_string(),
            "release".to_string(),
            "new".to_string(),
            format!("--from-release={}", self.from_release),
        ];
        if let Some(base) = &self.to_image_base {
            args.push(format!("--to-image-base={}", base));
        }
        args.push(format!("--to-image={}", self.to_image));
        if self.keep_manifest_list {
            args.push("--keep-manifest-list".to_string());
        }
        if self.allow_missing_images {
            args.push("--allow-missing-images".to_string());
        }
        args.extend(self.mappings.iter().map(|(component, image)| format!("{}={}", component, image)));
        args
    }
}

impl fmt::Display for ReleaseCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("oc")?;
        for arg in self.to_args() {
            write!(f, " {}", shell_quote(&arg))?;
        }
        Ok(())
    }
}

fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg.chars().all(|c| c.is_ascii_alphanumeric() || "_-./:@=,+%".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}
