//! 文件监视与自动重新生成。
//!
//! `notify` 的事件被转发进一个 mpsc 通道，[`SiteWatcher::run`] 在当前线程上
//! 读取通道：相关路径先进入去重的待处理集合，安静 `debounce` 时长之后整批
//! 交给回调，每批只调用一次。回调同步执行，执行期间到达的事件留在通道里，
//! 组成下一批，因此两次构建不会重叠。
//!
//! 单个文件（共享数据、`_config.yml`）通过非递归地监视其所在目录实现，
//! 事件在进入通道前按 [`WatchTarget`] 过滤。这样文件可以在监视开始后才创建，
//! 编辑器以“写新文件再重命名”的方式保存也不会丢失监视。
//!
//! [`WatchHandle`] 可以注入事件或停止循环，测试不依赖真实的文件系统时序。

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, warn};

use crate::core::error::WatchError;

/// 连续出错多少次后放弃监视
const MAX_CONSECUTIVE_ERRORS: usize = 5;
/// 没有待处理变化时的等待上限
const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// 通道中的消息
#[derive(Debug)]
pub enum WatchSignal {
    Fs(notify::Result<Event>),
    Stop,
}

/// 监视目标
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchTarget {
    /// 递归监视的目录；`skip_hidden` 为真时忽略其中的隐藏文件
    Tree { path: PathBuf, skip_hidden: bool },
    /// 单个文件，可以暂不存在
    File(PathBuf),
}

impl WatchTarget {
    /// 该目标是否关心这个路径
    pub fn covers(&self, path: &Path) -> bool {
        match self {
            WatchTarget::Tree { path: dir, skip_hidden } => match path.strip_prefix(dir) {
                Ok(rel) => !(*skip_hidden && is_hidden(rel)),
                Err(_) => false,
            },
            WatchTarget::File(file) => path == file,
        }
    }
}

/// 向监视循环发送消息的句柄，可以克隆
#[derive(Debug, Clone)]
pub struct WatchHandle {
    tx: Sender<WatchSignal>,
}

impl WatchHandle {
    /// 注入一个文件系统事件
    pub fn send(&self, event: Event) {
        let _ = self.tx.send(WatchSignal::Fs(Ok(event)));
    }

    /// 注入一个后端错误
    pub fn send_error(&self, error: notify::Error) {
        let _ = self.tx.send(WatchSignal::Fs(Err(error)));
    }

    /// 停止监视循环；尚未处理的变化被丢弃
    pub fn stop(&self) {
        let _ = self.tx.send(WatchSignal::Stop);
    }
}

/// 待处理变化的去重集合
struct Debouncer {
    pending: BTreeSet<PathBuf>,
    last_event: Option<Instant>,
    window: Duration,
}

impl Debouncer {
    fn new(window: Duration) -> Self {
        Self {
            pending: BTreeSet::new(),
            last_event: None,
            window,
        }
    }

    fn add(&mut self, event: Event) {
        let mut added = false;
        for path in event.paths {
            if is_temp_file(&path) {
                debug!("Ignoring temp file {}", path.display());
                continue;
            }
            self.pending.insert(path);
            added = true;
        }
        if added {
            self.last_event = Some(Instant::now());
        }
    }

    fn ready(&self) -> bool {
        !self.pending.is_empty() && self.last_event.is_some_and(|t| t.elapsed() >= self.window)
    }

    fn take(&mut self) -> Vec<PathBuf> {
        self.last_event = None;
        std::mem::take(&mut self.pending).into_iter().collect()
    }

    fn timeout(&self) -> Duration {
        match self.last_event {
            Some(t) if !self.pending.is_empty() => self.window.saturating_sub(t.elapsed()),
            _ => IDLE_TIMEOUT,
        }
    }
}

/// 监视循环
pub struct SiteWatcher {
    tx: Sender<WatchSignal>,
    rx: Receiver<WatchSignal>,
    debounce: Duration,
    root: Option<PathBuf>,
}

impl SiteWatcher {
    pub fn new(debounce: Duration) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            tx,
            rx,
            debounce,
            root: None,
        }
    }

    /// 日志中的路径相对于该目录显示
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn handle(&self) -> WatchHandle {
        WatchHandle {
            tx: self.tx.clone(),
        }
    }

    /// 创建 `notify` 监视器并把目标范围内的事件转发进通道
    ///
    /// 不存在的目录会被跳过。返回的监视器在循环运行期间必须保持存活。
    pub fn attach(&self, targets: &[WatchTarget]) -> Result<RecommendedWatcher, WatchError> {
        let tx = self.tx.clone();
        let scope = targets.to_vec();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let res = res.map(|mut event| {
                    event.paths.retain(|path| scope.iter().any(|t| t.covers(path)));
                    event
                });
                if matches!(&res, Ok(event) if event.paths.is_empty()) {
                    return;
                }
                let _ = tx.send(WatchSignal::Fs(res));
            },
            NotifyConfig::default(),
        )
        .map_err(WatchError::Init)?;

        let mut watched = 0;
        for (dir, mode) in watch_dirs(targets) {
            if !dir.is_dir() {
                warn!("Not watching {}: directory does not exist", self.rel(&dir));
                continue;
            }

            watcher
                .watch(&dir, mode)
                .map_err(|source| WatchError::Register {
                    path: dir.clone(),
                    source,
                })?;
            debug!("Watching {} ({:?})", self.rel(&dir), mode);
            watched += 1;
        }

        if watched == 0 {
            return Err(WatchError::NothingToWatch);
        }
        Ok(watcher)
    }

    /// 运行监视循环，直到收到停止信号或所有发送端关闭
    ///
    /// 每个去抖后的批次调用一次 `on_change`，参数为去重后的变化路径。
    pub fn run<F>(self, mut on_change: F) -> Result<(), WatchError>
    where
        F: FnMut(&[PathBuf]),
    {
        let SiteWatcher {
            tx,
            rx,
            debounce,
            root,
        } = self;
        // 只保留外部的发送端，全部关闭时循环结束
        drop(tx);

        let mut debouncer = Debouncer::new(debounce);
        let mut consecutive_errors = 0;

        loop {
            match rx.recv_timeout(debouncer.timeout()) {
                Ok(WatchSignal::Fs(Ok(event))) => {
                    consecutive_errors = 0;
                    if is_relevant(&event) {
                        debouncer.add(event);
                    } else {
                        debug!("Ignoring event {:?}", event.kind);
                    }
                }
                Ok(WatchSignal::Fs(Err(e))) => {
                    consecutive_errors += 1;
                    warn!(
                        "File watcher error ({}/{}): {}",
                        consecutive_errors, MAX_CONSECUTIVE_ERRORS, e
                    );
                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        return Err(WatchError::Backend {
                            attempts: consecutive_errors,
                            source: e,
                        });
                    }
                }
                Ok(WatchSignal::Stop) => {
                    info!("Stopped watching");
                    break;
                }
                Err(RecvTimeoutError::Timeout) => {
                    if debouncer.ready() {
                        let paths = debouncer.take();
                        let names: Vec<String> =
                            paths.iter().map(|p| relative(p, root.as_deref())).collect();
                        info!("Changes detected: [{}]", names.join(", "));
                        on_change(&paths);
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    debug!("Watch channel closed");
                    break;
                }
            }
        }

        Ok(())
    }

    fn rel(&self, path: &Path) -> String {
        relative(path, self.root.as_deref())
    }
}

/// 实际注册的目录：文件目标折算为其父目录（非递归），
/// 已被某个递归目录覆盖的父目录不再重复注册
fn watch_dirs(targets: &[WatchTarget]) -> Vec<(PathBuf, RecursiveMode)> {
    let trees: Vec<&Path> = targets
        .iter()
        .filter_map(|t| match t {
            WatchTarget::Tree { path, .. } => Some(path.as_path()),
            WatchTarget::File(_) => None,
        })
        .collect();

    let mut dirs: Vec<(PathBuf, RecursiveMode)> = Vec::new();
    for target in targets {
        let entry = match target {
            WatchTarget::Tree { path, .. } => (path.clone(), RecursiveMode::Recursive),
            WatchTarget::File(file) => match file.parent() {
                Some(parent) if !trees.iter().any(|tree| parent.starts_with(tree)) => {
                    (parent.to_path_buf(), RecursiveMode::NonRecursive)
                }
                _ => continue,
            },
        };
        if !dirs.iter().any(|(dir, _)| *dir == entry.0) {
            dirs.push(entry);
        }
    }
    dirs
}

fn relative(path: &Path, root: Option<&Path>) -> String {
    match root {
        Some(root) => crate::utils::display_relative(path, root),
        None => path.display().to_string(),
    }
}

/// 只关心创建、修改与删除
fn is_relevant(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

/// 相对路径中任何一级以 `.` 开头
fn is_hidden(rel: &Path) -> bool {
    rel.components()
        .any(|c| c.as_os_str().to_string_lossy().starts_with('.'))
}

/// 编辑器产生的临时或备份文件
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bak" | "swp" | "swo" | "swx" | "tmp")
        || name.ends_with('~')
        || name.starts_with(".#")
        || name == "4913"
}
