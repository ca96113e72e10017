use anyhow::{anyhow, Context, Result};
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

/// Return the commit id `rev` resolves to in `checkout`.
pub async fn commit_oid(checkout: &Path, rev: &str) -> Result<String> {
    let out = Command::new("git")
        .current_dir(checkout)
        .args(["rev-parse", rev])
        .output()
        .await
        .context("running git rev-parse")?;
    if !out.status.success() {
        return Err(anyhow!(
            "git rev-parse {rev} failed: {}",
            String::from_utf8_lossy(&out.stderr).trim()
        ));
    }
    let oid = String::from_utf8_lossy(&out.stdout).trim().to_string();
    if oid.is_empty() {
        return Err(anyhow!("git rev-parse {rev} printed nothing"));
    }
    Ok(oid)
}

/// Merge base of a pull request's merge commit: its first parent.
///
/// Returns `None` unless `merge_sha` really is a two-parent commit with
/// well-formed parent ids. Git failures are logged and also yield `None`.
pub async fn determine_merge_base_commit(checkout: &Path, merge_sha: &str) -> Option<String> {
    let out = match Command::new("git")
        .current_dir(checkout)
        .args(["show", "-s", "--format=raw", merge_sha])
        .output()
        .await
    {
        Ok(out) if out.status.success() => out,
        Ok(out) => {
            debug!(
                "git show {merge_sha} failed: {}",
                String::from_utf8_lossy(&out.stderr).trim()
            );
            return None;
        }
        Err(e) => {
            debug!("could not run git to find the merge base: {e}");
            return None;
        }
    };
    parse_merge_base(&String::from_utf8_lossy(&out.stdout), merge_sha)
}

/// Reads the `commit` and `parent` headers of `git show --format=raw`.
pub fn parse_merge_base(raw: &str, merge_sha: &str) -> Option<String> {
    let mut commit = None;
    let mut parents = Vec::new();
    for line in raw.lines() {
        if let Some(oid) = line.strip_prefix("commit ") {
            commit.get_or_insert(oid.trim());
        } else if let Some(oid) = line.strip_prefix("parent ") {
            parents.push(oid.trim());
        }
    }

    match (commit, parents.as_slice()) {
        (Some(c), [base, head, ..]) if c == merge_sha && is_sha1(base) && is_sha1(head) => {
            Some(base.to_string())
        }
        _ => None,
    }
}

fn is_sha1(oid: &str) -> bool {
    oid.len() == 40 && oid.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MERGE: &str = "1111111111111111111111111111111111111111";
    const BASE: &str = "2222222222222222222222222222222222222222";
    const HEAD: &str = "3333333333333333333333333333333333333333";

    #[test]
    fn merge_commit_yields_first_parent() {
        let raw = format!(
            "commit {MERGE}\ntree 4444444444444444444444444444444444444444\nparent {BASE}\nparent {HEAD}\nauthor A <a@example.com> 0 +0000\n\n    Merge {HEAD} into {BASE}\n"
        );
        assert_eq!(parse_merge_base(&raw, MERGE).as_deref(), Some(BASE));
    }

    #[test]
    fn non_merge_or_mismatched_commits_yield_nothing() {
        let single = format!("commit {MERGE}\nparent {BASE}\n");
        assert_eq!(parse_merge_base(&single, MERGE), None);

        let other = format!("commit {HEAD}\nparent {BASE}\nparent {MERGE}\n");
        assert_eq!(parse_merge_base(&other, MERGE), None);

        let short = format!("commit {MERGE}\nparent abc\nparent {HEAD}\n");
        assert_eq!(parse_merge_base(&short, MERGE), None);
    }
}
