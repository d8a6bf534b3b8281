//! Package managers known out of the box.
//!
//! Targets are relative to the configured target root. Source candidates are
//! listed most-likely-current first: Windows locations, then Unix ones.

use super::{DescriptorSpec, ProbeKind};

/// Static form of a descriptor, see [`DescriptorSpec`] for field meanings.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinDescriptor {
    pub name: &'static str,
    pub commands: &'static [&'static str],
    pub paths: &'static [&'static str],
    pub env_var: &'static str,
    pub value_template: Option<&'static str>,
    pub target: &'static str,
    pub sources: &'static [&'static str],
    pub probe: Option<ProbeKind>,
}

pub static NPM: BuiltinDescriptor = BuiltinDescriptor {
    name: "npm",
    commands: &["npm"],
    paths: &["$ProgramFiles/nodejs/npm*"],
    env_var: "NPM_CONFIG_CACHE",
    value_template: None,
    target: "npm",
    sources: &["$LOCALAPPDATA/npm-cache", "~/.npm"],
    probe: None,
};

pub static YARN: BuiltinDescriptor = BuiltinDescriptor {
    name: "yarn",
    commands: &["yarn"],
    paths: &["$APPDATA/npm/yarn*"],
    env_var: "YARN_CACHE_FOLDER",
    value_template: None,
    target: "yarn",
    sources: &["$LOCALAPPDATA/Yarn/Cache", "~/.cache/yarn"],
    probe: None,
};

pub static PNPM: BuiltinDescriptor = BuiltinDescriptor {
    name: "pnpm",
    commands: &["pnpm"],
    paths: &["$LOCALAPPDATA/pnpm/pnpm*"],
    env_var: "NPM_CONFIG_STORE_DIR",
    value_template: None,
    target: "pnpm-store",
    sources: &["$LOCALAPPDATA/pnpm/store", "~/.local/share/pnpm/store"],
    probe: None,
};

pub static NUGET: BuiltinDescriptor = BuiltinDescriptor {
    name: "nuget",
    commands: &["dotnet", "nuget"],
    paths: &["$ProgramFiles/dotnet/dotnet*"],
    env_var: "NUGET_PACKAGES",
    value_template: None,
    target: "nuget/packages",
    sources: &["$USERPROFILE/.nuget/packages", "~/.nuget/packages"],
    probe: Some(ProbeKind::DotnetNugetLocals),
};

pub static PIP: BuiltinDescriptor = BuiltinDescriptor {
    name: "pip",
    commands: &["pip", "pip3"],
    paths: &["$LOCALAPPDATA/Programs/Python/Python*/Scripts/pip*"],
    env_var: "PIP_CACHE_DIR",
    value_template: None,
    target: "pip",
    sources: &["$LOCALAPPDATA/pip/Cache", "~/.cache/pip"],
    probe: None,
};

pub static CARGO: BuiltinDescriptor = BuiltinDescriptor {
    name: "cargo",
    commands: &["cargo"],
    paths: &["~/.cargo/bin/cargo*"],
    env_var: "CARGO_HOME",
    value_template: None,
    target: "cargo",
    sources: &["$USERPROFILE/.cargo", "~/.cargo"],
    probe: None,
};

pub static MAVEN: BuiltinDescriptor = BuiltinDescriptor {
    name: "maven",
    commands: &["mvn"],
    paths: &["$ProgramFiles/Apache/maven*", "/usr/share/maven*"],
    env_var: "MAVEN_OPTS",
    value_template: Some("-Dmaven.repo.local={path}"),
    target: "maven",
    sources: &["$USERPROFILE/.m2/repository", "~/.m2/repository"],
    probe: None,
};

pub static GRADLE: BuiltinDescriptor = BuiltinDescriptor {
    name: "gradle",
    commands: &["gradle"],
    paths: &["~/.gradle/wrapper/dists/*"],
    env_var: "GRADLE_USER_HOME",
    value_template: None,
    target: "gradle",
    sources: &["$USERPROFILE/.gradle", "~/.gradle"],
    probe: None,
};

pub static VCPKG: BuiltinDescriptor = BuiltinDescriptor {
    name: "vcpkg",
    commands: &["vcpkg"],
    paths: &["$VCPKG_ROOT/vcpkg*"],
    env_var: "VCPKG_DEFAULT_BINARY_CACHE",
    value_template: None,
    target: "vcpkg",
    sources: &["$LOCALAPPDATA/vcpkg/archives", "~/.cache/vcpkg/archives"],
    probe: None,
};

pub static GO: BuiltinDescriptor = BuiltinDescriptor {
    name: "go",
    commands: &["go"],
    paths: &["$ProgramFiles/Go/bin/go*", "/usr/local/go/bin/go"],
    env_var: "GOMODCACHE",
    value_template: None,
    target: "go/pkg/mod",
    sources: &["$USERPROFILE/go/pkg/mod", "~/go/pkg/mod"],
    probe: None,
};

pub static BUILTINS: &[&BuiltinDescriptor] = &[
    &NPM, &YARN, &PNPM, &NUGET, &PIP, &CARGO, &MAVEN, &GRADLE, &VCPKG, &GO,
];

impl From<&BuiltinDescriptor> for DescriptorSpec {
    fn from(builtin: &BuiltinDescriptor) -> Self {
        fn owned(items: &[&str]) -> Vec<String> {
            items.iter().map(|s| s.to_string()).collect()
        }

        DescriptorSpec {
            name: builtin.name.to_string(),
            detection_commands: owned(builtin.commands),
            detection_paths: owned(builtin.paths),
            env_var: builtin.env_var.to_string(),
            env_value_template: builtin.value_template.map(str::to_string),
            target: builtin.target.to_string(),
            source_paths: owned(builtin.sources),
            probe: builtin.probe,
        }
    }
}

pub fn builtin_specs() -> Vec<DescriptorSpec> {
    BUILTINS.iter().map(|b| DescriptorSpec::from(*b)).collect()
}
