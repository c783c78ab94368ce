use anyhow::{anyhow, Context, Result};
use fs2::FileExt;
use std::{
    env,
    fs::{self, File, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Change { monitor: Option<String> },
    Stop,
}

impl Request {
    pub fn parse_line(line: &str) -> Result<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line == "STOP" {
            return Ok(Self::Stop);
        }
        if line == "CHANGE" {
            return Ok(Self::Change { monitor: None });
        }
        if let Some(rest) = line.strip_prefix("CHANGE ") {
            let monitor = rest.trim();
            if monitor.is_empty() {
                return Ok(Self::Change { monitor: None });
            }
            return Ok(Self::Change {
                monitor: Some(monitor.to_string()),
            });
        }

        Err(anyhow!("unknown request")).with_context(|| format!("line: {line:?}"))
    }

    pub fn to_line(&self) -> String {
        match self {
            Self::Stop => "STOP\n".to_string(),
            Self::Change { monitor: None } => "CHANGE\n".to_string(),
            Self::Change {
                monitor: Some(monitor),
            } => format!("CHANGE {monitor}\n"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ControlPaths {
    pub lock: PathBuf,
    pub pid: PathBuf,
    pub log: PathBuf,
    requests: PathBuf,
    queue_lock: PathBuf,
}

impl ControlPaths {
    pub fn system() -> Self {
        Self::in_dir(&env::temp_dir())
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self {
            lock: dir.join("mural-daemon.lock"),
            pid: dir.join("mural-daemon.pid"),
            log: dir.join("mural-daemon.log"),
            requests: dir.join("mural-daemon.requests"),
            queue_lock: dir.join("mural-daemon.requests.lock"),
        }
    }

    pub fn acquire_lock(&self) -> Result<File> {
        let lock_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.lock)
            .with_context(|| format!("failed to open {}", self.lock.display()))?;

        lock_file
            .try_lock_exclusive()
            .map_err(|_| anyhow!("mural daemon is already running"))?;

        Ok(lock_file)
    }

    pub fn daemon_is_running(&self) -> bool {
        let Ok(file) = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.lock)
        else {
            return false;
        };

        match file.try_lock_exclusive() {
            Ok(()) => {
                let _ = file.unlock();
                false
            }
            Err(_) => true,
        }
    }

    pub fn write_pid(&self, pid: u32) -> Result<()> {
        fs::write(&self.pid, pid.to_string())
            .with_context(|| format!("failed to write {}", self.pid.display()))
    }

    /// Runs `f` while holding the request queue lock, shared by senders and the drain.
    fn with_queue_lock<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let lock_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.queue_lock)
            .with_context(|| format!("failed to open {}", self.queue_lock.display()))?;
        lock_file
            .lock_exclusive()
            .with_context(|| format!("failed to lock {}", self.queue_lock.display()))?;

        let result = f();
        let _ = lock_file.unlock();
        result
    }

    pub fn send(&self, request: &Request) -> Result<()> {
        self.with_queue_lock(|| {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.requests)
                .with_context(|| format!("failed to open {}", self.requests.display()))?;
            file.write_all(request.to_line().as_bytes())?;
            Ok(())
        })
    }

    pub fn take_requests(&self) -> Vec<Request> {
        let drained = self.with_queue_lock(|| match fs::read_to_string(&self.requests) {
            Ok(content) => {
                fs::remove_file(&self.requests)
                    .with_context(|| format!("failed to remove {}", self.requests.display()))?;
                Ok(content)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(err) => Err(err)
                .with_context(|| format!("failed to read {}", self.requests.display())),
        });

        let content = match drained {
            Ok(content) => content,
            Err(err) => {
                warn!("unable to read daemon requests: {err:#}");
                return Vec::new();
            }
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match Request::parse_line(line) {
                Ok(request) => Some(request),
                Err(err) => {
                    warn!("ignoring daemon request: {err:#}");
                    None
                }
            })
            .collect()
    }

    pub fn cleanup(&self) {
        let _ = fs::remove_file(&self.pid);
        let _ = self.with_queue_lock(|| {
            let _ = fs::remove_file(&self.requests);
            Ok(())
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_parse_from_lines() {
        assert_eq!(Request::parse_line("STOP\n").unwrap(), Request::Stop);
        assert_eq!(
            Request::parse_line("CHANGE").unwrap(),
            Request::Change { monitor: None }
        );
        assert_eq!(
            Request::parse_line("CHANGE \\\\?\\DISPLAY#DEL40F7#1\r\n").unwrap(),
            Request::Change {
                monitor: Some("\\\\?\\DISPLAY#DEL40F7#1".to_string())
            }
        );
        assert!(Request::parse_line("RESTART").is_err());
    }

    #[test]
    fn queued_requests_are_drained_once_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ControlPaths::in_dir(dir.path());

        assert!(paths.take_requests().is_empty());

        paths.send(&Request::Change { monitor: None }).unwrap();
        paths
            .send(&Request::Change {
                monitor: Some("m2".to_string()),
            })
            .unwrap();
        paths.send(&Request::Stop).unwrap();

        assert_eq!(
            paths.take_requests(),
            vec![
                Request::Change { monitor: None },
                Request::Change {
                    monitor: Some("m2".to_string())
                },
                Request::Stop,
            ]
        );
        assert!(paths.take_requests().is_empty());
    }

    #[test]
    fn requests_sent_while_draining_are_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ControlPaths::in_dir(dir.path());
        let senders = 4;
        let per_sender = 50;

        let handles: Vec<_> = (0..senders)
            .map(|n| {
                let paths = paths.clone();
                std::thread::spawn(move || {
                    for i in 0..per_sender {
                        paths
                            .send(&Request::Change {
                                monitor: Some(format!("m{n}-{i}")),
                            })
                            .unwrap();
                    }
                })
            })
            .collect();

        let mut received = Vec::new();
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(10);
        while received.len() < senders * per_sender {
            assert!(std::time::Instant::now() < deadline, "requests were lost");
            received.extend(paths.take_requests());
        }
        for handle in handles {
            handle.join().unwrap();
        }
        received.extend(paths.take_requests());

        assert_eq!(received.len(), senders * per_sender);
        for n in 0..senders {
            let order: Vec<_> = received
                .iter()
                .filter_map(|r| match r {
                    Request::Change { monitor: Some(id) } if id.starts_with(&format!("m{n}-")) => {
                        Some(id.clone())
                    }
                    _ => None,
                })
                .collect();
            let expected: Vec<_> = (0..per_sender).map(|i| format!("m{n}-{i}")).collect();
            assert_eq!(order, expected);
        }
    }

    #[test]
    fn lock_is_exclusive() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ControlPaths::in_dir(dir.path());

        assert!(!paths.daemon_is_running());
        let held = paths.acquire_lock().unwrap();
        assert!(paths.daemon_is_running());
        assert!(paths.acquire_lock().is_err());

        drop(held);
        assert!(!paths.daemon_is_running());
    }
}
