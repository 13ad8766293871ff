//! Concrete command lines for the external sync tool.

use std::fmt;
use std::path::Path;

use serde::Serialize;

use omniclone_core::{paths, Mode, Target, TargetName};

/// Subcommand selecting the sync semantics for a mode.
pub fn subcommand(mode: Mode) -> &'static str {
    match mode {
        Mode::Bisync => "bisync",
        Mode::Backup => "sync",
    }
}

/// One fully-built child process command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invocation {
    pub target: TargetName,
    pub mode: Mode,
    pub program: String,
    /// Everything after the program name.
    pub args: Vec<String>,
}

impl Invocation {
    /// `program <subcommand> <src> <dst> <flags...>`
    ///
    /// `src` is expanded against `home` and anchored at `config_dir` when
    /// relative; `dst` is passed through untouched.
    pub fn build(
        program: &str,
        target: &Target,
        flags: Vec<String>,
        home: &Path,
        config_dir: &Path,
    ) -> Self {
        let src = paths::resolve_local_at(&target.src, home, config_dir);
        let mut args = Vec::with_capacity(3 + flags.len());
        args.push(subcommand(target.mode()).to_owned());
        args.push(src.to_string_lossy().into_owned());
        args.push(target.dst.clone());
        args.extend(flags);

        Self {
            target: target.name().clone(),
            mode: target.mode(),
            program: program.to_owned(),
            args,
        }
    }

    /// Arrow used in progress log lines.
    pub fn direction(&self) -> &'static str {
        match self.mode {
            Mode::Bisync => "<-->",
            Mode::Backup => "-->",
        }
    }

    /// Source operand, or `""` for an invocation not made by [`Self::build`].
    pub fn src(&self) -> &str {
        self.args.get(1).map_or("", String::as_str)
    }

    pub fn dst(&self) -> &str {
        self.args.get(2).map_or("", String::as_str)
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", quote(arg))?;
        }
        Ok(())
    }
}

fn quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@,+~%".contains(c));
    if plain {
        arg.to_owned()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn home() -> PathBuf {
        PathBuf::from("/home/tester")
    }

    #[test]
    fn bisync_uses_bisync_subcommand() {
        let target = Target::new("rclone", Mode::Bisync, "~/gdrive", "remote:rclone");
        let inv = Invocation::build("rclone", &target, vec!["-v".into()], &home(), &home());
        assert_eq!(inv.program, "rclone");
        assert_eq!(
            inv.args,
            vec!["bisync", "/home/tester/gdrive", "remote:rclone", "-v"]
        );
        assert_eq!(inv.direction(), "<-->");
    }

    #[test]
    fn backup_uses_sync_subcommand_and_keeps_dst_verbatim() {
        let target = Target::new("docs", Mode::Backup, "/srv/docs", "~/not-expanded");
        let inv = Invocation::build("rclone", &target, vec![], &home(), &home());
        assert_eq!(inv.args, vec!["sync", "/srv/docs", "~/not-expanded"]);
        assert_eq!(inv.src(), "/srv/docs");
        assert_eq!(inv.dst(), "~/not-expanded");
    }

    #[test]
    fn display_quotes_awkward_arguments() {
        let target = Target::new("m", Mode::Backup, "/srv/my music", "remote:music");
        let inv = Invocation::build("rclone", &target, vec!["--exclude".into(), "*.tmp".into()], &home(), &home());
        assert_eq!(
            inv.to_string(),
            "rclone sync '/srv/my music' remote:music --exclude '*.tmp'"
        );
    }

    #[test]
    fn hand_built_invocation_has_empty_operands() {
        let inv = Invocation {
            target: TargetName::from("t"),
            mode: Mode::Backup,
            program: "sh".into(),
            args: vec!["-c".into()],
        };
        assert_eq!(inv.src(), "");
        assert_eq!(inv.dst(), "");
    }
}
