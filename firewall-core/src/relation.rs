//! The relation heuristic: a fuzzy match between a domain's labels
//! and the deciding process's identity, used to short-circuit prompting.

use crate::entity::Communication;
use crate::profile::ProfileSet;

/// Result of a successful match, carrying the matched pair for the
/// caller's "domain is related to process: X is related to Y" reason text.
pub struct RelationMatch {
    pub domain_element: String,
    pub process_element: String,
}

fn split_path(path: &str) -> Vec<&str> {
    // Treat either `/` or `\` as a separator so the heuristic behaves the
    // same on POSIX and Windows paths.
    let elements: Vec<&str> = path.split(['/', '\\']).filter(|s| !s.is_empty()).collect();
    if elements.len() > 2 {
        elements[elements.len() - 2..].to_vec()
    } else {
        elements
    }
}

fn fuzzy_match(a: &str, b: &str, threshold: f64) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    strsim::normalized_levenshtein(a, b) > threshold
}

/// Checks whether `fqdn`'s labels fuzzy-match the process path's last two
/// segments, the profile's display name, the process name, or the exec
/// name, in that order, for each domain label in turn. First hit wins.
pub fn matches(
    communication: &Communication,
    profile_set: &ProfileSet,
    fqdn: &str,
    threshold: f64,
) -> Option<RelationMatch> {
    let process = communication.process();
    let path_elements = split_path(&process.path);
    let display_name = profile_set.display_name();

    for domain_element in fqdn.split('.') {
        if domain_element.is_empty() {
            continue;
        }
        for path_element in &path_elements {
            if fuzzy_match(domain_element, path_element, threshold) {
                return Some(RelationMatch {
                    domain_element: domain_element.to_string(),
                    process_element: path_element.to_string(),
                });
            }
        }
        if fuzzy_match(domain_element, &display_name, threshold) {
            return Some(RelationMatch {
                domain_element: domain_element.to_string(),
                process_element: display_name,
            });
        }
        if fuzzy_match(domain_element, &process.name, threshold) {
            return Some(RelationMatch {
                domain_element: domain_element.to_string(),
                process_element: process.name.clone(),
            });
        }
        if fuzzy_match(domain_element, &process.exec_name, threshold) {
            return Some(RelationMatch {
                domain_element: domain_element.to_string(),
                process_element: process.exec_name.clone(),
            });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Domain, Process};
    use crate::profile::ProfileMode;

    #[test]
    fn matches_on_process_name() {
        let process = Process::new(1, "/usr/bin/steam", "steam", "steam");
        let comm = Communication::new(process, Domain::Fqdn("api.steampowered.com.".into()), false);
        let ps = ProfileSet::new(ProfileMode::Prompt, vec![], "Steam");
        let result = matches(&comm, &ps, "api.steampowered.com.", 0.5);
        assert!(result.is_some());
    }

    #[test]
    fn unrelated_domain_does_not_match() {
        let process = Process::new(1, "/usr/bin/zzzzz", "zzzzz", "zzzzz");
        let comm = Communication::new(process, Domain::Fqdn("example.com.".into()), false);
        let ps = ProfileSet::new(ProfileMode::Prompt, vec![], "Unrelated App Name");
        let result = matches(&comm, &ps, "example.com.", 0.5);
        assert!(result.is_none());
    }

    #[test]
    fn empty_strings_never_crash_or_match() {
        let process = Process::new(1, "", "", "");
        let comm = Communication::new(process, Domain::Fqdn(".".into()), false);
        let ps = ProfileSet::new(ProfileMode::Prompt, vec![], "");
        let result = matches(&comm, &ps, "", 0.5);
        assert!(result.is_none());
    }

    #[test]
    fn path_split_handles_windows_separators() {
        assert_eq!(split_path("C:\\Program Files\\App\\app.exe"), vec!["App", "app.exe"]);
    }
}
