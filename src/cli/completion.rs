//! Shell completion generation for hitexport
//!
//! Generates completion scripts for bash, zsh and fish. Bash and fish also
//! complete `--tenant` from the artifacts already present in the artifact
//! directory: `$HITEXPORT_ARTIFACT_DIR`, else the system temp directory that
//! the default configuration uses.

use clap::CommandFactory;
use clap_complete::{Shell, generate};
use std::io::{self, Write};

use crate::cli::CliArgs;
use crate::error::{HitExportError, Result};

/// Print the completion script for `shell_name` to stdout
pub fn generate_completion(shell_name: &str) -> Result<()> {
    let shell = parse_shell(shell_name)?;
    let script = render_completion(shell);
    io::stdout().write_all(script.as_bytes())?;
    Ok(())
}

/// Parse shell name string to Shell enum
fn parse_shell(shell_name: &str) -> Result<Shell> {
    match shell_name.to_lowercase().as_str() {
        "bash" => Ok(Shell::Bash),
        "zsh" => Ok(Shell::Zsh),
        "fish" => Ok(Shell::Fish),
        _ => Err(HitExportError::Generic(format!(
            "Unsupported shell: {}. Supported shells: bash, zsh, fish",
            shell_name
        ))),
    }
}

fn render_completion(shell: Shell) -> String {
    let mut cmd = CliArgs::command();
    let mut buffer = Vec::new();
    generate(shell, &mut cmd, "hitexport", &mut buffer);
    let basic = String::from_utf8_lossy(&buffer);

    match shell {
        Shell::Bash => format!("{}{}", basic, BASH_TENANTS),
        Shell::Fish => format!("{}{}", basic, FISH_TENANTS),
        _ => basic.into_owned(),
    }
}

const BASH_TENANTS: &str = r#"
# Complete tenant codes from published artifacts
_hitexport_list_tenants() {
    local dir="${HITEXPORT_ARTIFACT_DIR:-${TMPDIR:-/tmp}}"
    ls "$dir" 2>/dev/null | sed -n 's/^export-\(.*\)\.csv\.gz$/\1/p'
}

_hitexport_enhanced() {
    local cur="${COMP_WORDS[COMP_CWORD]}"
    local prev="${COMP_WORDS[COMP_CWORD-1]}"
    if [[ "$prev" == "-t" || "$prev" == "--tenant" ]]; then
        COMPREPLY=($(compgen -W "$(_hitexport_list_tenants)" -- "$cur"))
        return 0
    fi
    _hitexport "$@"
}

complete -F _hitexport_enhanced -o bashdefault -o default hitexport
"#;

const FISH_TENANTS: &str = r#"
# Complete tenant codes from published artifacts
function __hitexport_list_tenants
    set -l dir /tmp
    set -q TMPDIR; and set dir $TMPDIR
    set -q HITEXPORT_ARTIFACT_DIR; and set dir $HITEXPORT_ARTIFACT_DIR
    ls $dir 2>/dev/null | string replace -r -f '^export-(.*)\.csv\.gz$' '$1'
end

complete -c hitexport -s t -l tenant -f -a "(__hitexport_list_tenants)" -d "Tenant code"
"#;
