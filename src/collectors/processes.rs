use crate::collectors::{ProcessRecord, ProcessState};
use sysinfo::{PidExt, ProcessExt, System, SystemExt, UserExt};
use tracing::debug;

const WINDOWS_SYSTEM_ACCOUNTS: [&str; 4] = [
    "NT AUTHORITY\\SYSTEM",
    "NT AUTHORITY\\LOCAL SERVICE",
    "NT AUTHORITY\\NETWORK SERVICE",
    "SYSTEM",
];

// Selected once at startup. The Windows variant tolerates domain-qualified
// account names by substring containment; the Unix variant requires an exact
// match and always rejects root.
#[derive(Debug, Clone)]
pub enum OwnershipFilter {
    Windows { current_user: String },
    Unix { current_user: String },
}

impl OwnershipFilter {
    pub fn for_current_platform(current_user: String) -> Self {
        if cfg!(windows) {
            Self::Windows { current_user }
        } else {
            Self::Unix { current_user }
        }
    }

    pub fn matches(&self, owner: &str) -> bool {
        match self {
            Self::Windows { current_user } => {
                // An empty current user must match nothing, not everything.
                !current_user.is_empty()
                    && !WINDOWS_SYSTEM_ACCOUNTS.contains(&owner)
                    && owner.contains(current_user.as_str())
            }
            Self::Unix { current_user } => owner != "root" && owner == current_user,
        }
    }
}

// Effective owner of our own process first; login-name env vars can be absent
// in non-interactive contexts.
pub fn current_username(system: &System) -> Option<String> {
    let from_own_process = sysinfo::get_current_pid().ok().and_then(|pid| {
        let uid = system.process(pid)?.user_id()?;
        Some(system.get_user_by_id(uid)?.name().to_string())
    });

    from_own_process.or_else(|| {
        std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .ok()
            .filter(|name| !name.trim().is_empty())
    })
}

pub fn sample_processes(system: &mut System, filter: &OwnershipFilter) -> Vec<ProcessRecord> {
    system.refresh_users_list();
    system.refresh_processes();

    let mut records: Vec<ProcessRecord> = system
        .processes()
        .iter()
        .filter_map(|(pid, process)| {
            // No resolvable owner: kernel thread, exited, or access denied.
            let uid = process.user_id()?;
            let owner = system.get_user_by_id(uid)?.name();
            if !filter.matches(owner) {
                return None;
            }

            Some(ProcessRecord {
                process_name: process.name().to_string(),
                status: ProcessState::from(process.status()),
                pid: pid.as_u32(),
                memory_mb: memory_mb(process.memory()),
                user: if cfg!(windows) {
                    None
                } else {
                    Some(owner.to_string())
                },
            })
        })
        .collect();

    sort_by_memory(&mut records);
    debug!(count = records.len(), "collected user-owned processes");
    records
}

fn memory_mb(bytes: u64) -> f64 {
    (bytes as f64 / (1024.0 * 1024.0) * 10.0).round() / 10.0
}

fn sort_by_memory(records: &mut [ProcessRecord]) {
    records.sort_by(|a, b| b.memory_mb.total_cmp(&a.memory_mb));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unix_filter_requires_exact_match_and_rejects_root() {
        let filter = OwnershipFilter::Unix {
            current_user: "alice".to_string(),
        };
        assert!(filter.matches("alice"));
        assert!(!filter.matches("alice2"));
        assert!(!filter.matches("bob"));
        assert!(!filter.matches("root"));

        let as_root = OwnershipFilter::Unix {
            current_user: "root".to_string(),
        };
        assert!(!as_root.matches("root"));
    }

    #[test]
    fn windows_filter_rejects_service_accounts_and_accepts_domain_names() {
        let filter = OwnershipFilter::Windows {
            current_user: "alice".to_string(),
        };
        assert!(filter.matches("alice"));
        assert!(filter.matches("CONTOSO\\alice"));
        assert!(!filter.matches("NT AUTHORITY\\SYSTEM"));
        assert!(!filter.matches("NT AUTHORITY\\LOCAL SERVICE"));
        assert!(!filter.matches("NT AUTHORITY\\NETWORK SERVICE"));
        assert!(!filter.matches("SYSTEM"));
        assert!(!filter.matches("CONTOSO\\bob"));
    }

    #[test]
    fn windows_filter_with_unresolved_user_matches_nothing() {
        let filter = OwnershipFilter::Windows {
            current_user: String::new(),
        };
        assert!(!filter.matches("alice"));
        assert!(!filter.matches("CONTOSO\\bob"));
        assert!(!filter.matches("NT AUTHORITY\\SYSTEM"));
    }

    #[test]
    fn memory_is_rounded_to_one_decimal() {
        assert_eq!(memory_mb(0), 0.0);
        assert_eq!(memory_mb(1024 * 1024), 1.0);
        assert_eq!(memory_mb(1536 * 1024), 1.5);
        // 123.456.. MB rounds to 123.5
        assert_eq!(memory_mb(129_452_523), 123.5);
    }

    #[test]
    fn sorts_descending_by_memory() {
        let mut records = vec![
            ProcessRecord {
                process_name: "small".to_string(),
                status: crate::collectors::ProcessState::Sleeping,
                pid: 1,
                memory_mb: 1.5,
                user: None,
            },
            ProcessRecord {
                process_name: "big".to_string(),
                status: crate::collectors::ProcessState::Running,
                pid: 2,
                memory_mb: 900.0,
                user: None,
            },
            ProcessRecord {
                process_name: "mid".to_string(),
                status: crate::collectors::ProcessState::Running,
                pid: 3,
                memory_mb: 44.2,
                user: None,
            },
        ];
        sort_by_memory(&mut records);
        let names: Vec<&str> = records.iter().map(|r| r.process_name.as_str()).collect();
        assert_eq!(names, vec!["big", "mid", "small"]);
    }

    #[test]
    fn sampled_processes_are_owned_by_current_user_and_sorted() {
        let mut system = System::new_all();
        system.refresh_users_list();
        let current = current_username(&system).unwrap_or_default();
        let filter = OwnershipFilter::for_current_platform(current.clone());

        let records = sample_processes(&mut system, &filter);
        for pair in records.windows(2) {
            assert!(pair[0].memory_mb >= pair[1].memory_mb);
        }
        if cfg!(not(windows)) {
            for record in &records {
                assert_eq!(record.user.as_deref(), Some(current.as_str()));
            }
        }
    }
}
