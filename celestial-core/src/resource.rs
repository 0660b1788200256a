//! 资源系统：按路径访问随应用一起分发的媒体文件（图片、音频、字体）以及内置着色器。
//!
//! [`AssetBundle`] 以一个磁盘目录为根；资源在首次访问时才从文件系统读取，读取结果会被缓存。
//! 也可以直接把内存数据注册到某个路径下（内置着色器即如此）。

use std::{
    collections::HashMap,
    fmt::{self, Display},
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::RwLock;
use tokio::task::JoinSet;
use tracing::{debug, warn};

#[derive(Debug)]
pub struct Resource {
    fs_path: Option<PathBuf>,
    // fs_path 为 None 时，资源仅存在于内存中，data 总为 Some
    data: Option<Arc<[u8]>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourcePath(Vec<String>);

impl ResourcePath {
    pub fn new<S: Into<Vec<String>>>(segments: S) -> Self {
        Self(segments.into())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn join(&self, separator: &str) -> String {
        self.0.join(separator)
    }

    /// 最后一段的扩展名（小写）。
    pub fn extension(&self) -> Option<String> {
        let last = self.0.last()?;
        let (_, ext) = last.rsplit_once('.')?;
        Some(ext.to_ascii_lowercase())
    }

    /// 拼接到磁盘根目录下。
    pub fn to_fs_path(&self, root: &Path) -> PathBuf {
        self.0.iter().fold(root.to_path_buf(), |acc, s| acc.join(s))
    }
}

impl Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.join("/"))
    }
}

impl From<&str> for ResourcePath {
    fn from(value: &str) -> Self {
        value
            .split('/')
            .filter(|segment| !segment.is_empty() && *segment != ".")
            .collect()
    }
}

impl From<String> for ResourcePath {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<&ResourcePath> for ResourcePath {
    fn from(value: &ResourcePath) -> Self {
        value.clone()
    }
}

impl<'a> FromIterator<&'a str> for ResourcePath {
    fn from_iter<T: IntoIterator<Item = &'a str>>(iter: T) -> Self {
        Self(iter.into_iter().map(str::to_string).collect())
    }
}

pub type ResourceHandle = Arc<RwLock<Resource>>;

#[derive(Debug)]
pub enum ResourceError {
    PathConflict(ResourcePath),
    NotFound(ResourcePath),
    /// 资源存在但内容为空。
    Empty(ResourcePath),
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl Display for ResourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceError::PathConflict(path) => {
                write!(f, "资源路径冲突：{path} 已注册")
            }
            ResourceError::NotFound(path) => write!(f, "找不到资源：{path}"),
            ResourceError::Empty(path) => write!(f, "资源内容为空：{path}"),
            ResourceError::Io { path, source } => {
                write!(f, "读取资源文件 {} 失败：{source}", path.display())
            }
        }
    }
}

impl std::error::Error for ResourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResourceError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl Resource {
    pub fn from_memory(data: Vec<u8>) -> ResourceHandle {
        Arc::new(RwLock::new(Self {
            fs_path: None,
            data: Some(Arc::from(data)),
        }))
    }

    pub fn from_file(path: &Path) -> ResourceHandle {
        Arc::new(RwLock::new(Self {
            fs_path: Some(path.to_path_buf()),
            data: None,
        }))
    }

    pub fn fs_path(&self) -> Option<&Path> {
        self.fs_path.as_deref()
    }

    pub fn data_loaded(&self) -> bool {
        self.data.is_some()
    }

    /// 已缓存时返回数据，否则返回 `None`，调用方应退回到 [`Self::get_data_arc`]。
    pub fn try_get_data_arc(&self) -> Option<Arc<[u8]>> {
        self.data.clone()
    }

    /// 确保资源已加载并返回内部数据。
    ///
    /// 读取失败不会被缓存，下一次访问会重新尝试。
    pub fn get_data_arc(&mut self) -> Result<Arc<[u8]>, ResourceError> {
        if let Some(data) = &self.data {
            return Ok(Arc::clone(data));
        }
        let Some(path) = &self.fs_path else {
            return Ok(Arc::from(Vec::new()));
        };
        let bytes = std::fs::read(path).map_err(|source| ResourceError::Io {
            path: path.clone(),
            source,
        })?;
        let data: Arc<[u8]> = Arc::from(bytes);
        self.data = Some(Arc::clone(&data));
        Ok(data)
    }
}

/// 读取句柄指向的数据：先尝试读锁命中缓存，失败再加写锁加载。
pub fn load_bytes(handle: &ResourceHandle) -> Result<Arc<[u8]>, ResourceError> {
    if let Some(bytes) = handle.read().try_get_data_arc() {
        return Ok(bytes);
    }
    handle.write().get_data_arc()
}

struct BundleInner {
    root: Option<PathBuf>,
    entries: RwLock<HashMap<ResourcePath, ResourceHandle>>,
}

/// 资源包：磁盘目录 + 内存注册表。
///
/// 克隆开销很小（内部共享同一份注册表）。
#[derive(Clone)]
pub struct AssetBundle {
    inner: Arc<BundleInner>,
}

impl fmt::Debug for AssetBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetBundle")
            .field("root", &self.inner.root)
            .field("entries", &self.inner.entries.read().len())
            .finish()
    }
}

const BUILTIN_SHADERS: [(&str, &[u8]); 2] = [
    (
        "shaders/scene3d.wgsl",
        include_bytes!("resource/shaders/scene3d.wgsl"),
    ),
    (
        "shaders/overlay.wgsl",
        include_bytes!("resource/shaders/overlay.wgsl"),
    ),
];

impl AssetBundle {
    /// 以 `root` 为根目录创建资源包，并注册内置着色器。
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_root(Some(root.into()))
    }

    /// 只包含内存资源（与内置着色器）的资源包。
    pub fn in_memory() -> Self {
        Self::with_root(None)
    }

    fn with_root(root: Option<PathBuf>) -> Self {
        let mut entries = HashMap::new();
        for (path, bytes) in BUILTIN_SHADERS {
            entries.insert(ResourcePath::from(path), Resource::from_memory(bytes.to_vec()));
        }
        Self {
            inner: Arc::new(BundleInner {
                root,
                entries: RwLock::new(entries),
            }),
        }
    }

    pub fn root(&self) -> Option<&Path> {
        self.inner.root.as_deref()
    }

    /// 把一份资源注册到指定路径。路径已被占用时返回 [`ResourceError::PathConflict`]。
    pub fn register(
        &self,
        path: impl Into<ResourcePath>,
        resource: ResourceHandle,
    ) -> Result<(), ResourceError> {
        let path = path.into();
        let mut entries = self.inner.entries.write();
        if entries.contains_key(&path) {
            return Err(ResourceError::PathConflict(path));
        }
        entries.insert(path, resource);
        Ok(())
    }

    /// 查找资源句柄。
    ///
    /// 未注册但磁盘上存在的文件会被登记为惰性资源（此时尚未读取内容）。
    pub fn get(&self, path: impl Into<ResourcePath>) -> Option<ResourceHandle> {
        let path = path.into();
        if let Some(handle) = self.inner.entries.read().get(&path) {
            return Some(Arc::clone(handle));
        }

        let fs_path = path.to_fs_path(self.inner.root.as_deref()?);
        if !fs_path.is_file() {
            return None;
        }

        let mut entries = self.inner.entries.write();
        let handle = entries
            .entry(path)
            .or_insert_with(|| Resource::from_file(&fs_path));
        Some(Arc::clone(handle))
    }

    /// 查找并读取资源数据。
    pub fn load(&self, path: impl Into<ResourcePath>) -> Result<Arc<[u8]>, ResourceError> {
        let path = path.into();
        let handle = self
            .get(path.clone())
            .ok_or(ResourceError::NotFound(path))?;
        load_bytes(&handle)
    }

    /// 读取 UTF-8 文本资源。
    pub fn load_string(&self, path: impl Into<ResourcePath>) -> anyhow::Result<String> {
        let path = path.into();
        let bytes = self.load(path.clone())?;
        let text = std::str::from_utf8(bytes.as_ref())
            .map_err(|err| anyhow::anyhow!("{path}: bytes are not valid UTF-8: {err}"))?;
        Ok(text.to_owned())
    }

    /// 并发预读一组磁盘资源，返回每个路径的读取结果。
    ///
    /// 已缓存的资源直接视为成功；读取成功的数据写回注册表。
    pub async fn preload<I, P>(&self, paths: I) -> Vec<(ResourcePath, Result<(), ResourceError>)>
    where
        I: IntoIterator<Item = P>,
        P: Into<ResourcePath>,
    {
        let mut results = Vec::new();
        let mut join_set = JoinSet::new();

        for path in paths.into_iter().map(Into::into) {
            let cached = self
                .inner
                .entries
                .read()
                .get(&path)
                .is_some_and(|handle| handle.read().data_loaded());
            if cached {
                results.push((path, Ok(())));
                continue;
            }

            let Some(root) = self.inner.root.clone() else {
                results.push((path.clone(), Err(ResourceError::NotFound(path))));
                continue;
            };

            join_set.spawn(async move {
                let fs_path = path.to_fs_path(&root);
                let read = tokio::fs::read(&fs_path).await;
                (path, fs_path, read)
            });
        }

        while let Some(task) = join_set.join_next().await {
            let (path, fs_path, read) = match task {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(target: "celestial-core", error = %err, "asset preload task panicked");
                    continue;
                }
            };

            match read {
                Ok(bytes) => {
                    debug!(target: "celestial-core", path = %path, size = bytes.len(), "asset preloaded");
                    let handle = Arc::new(RwLock::new(Resource {
                        fs_path: Some(fs_path),
                        data: Some(Arc::from(bytes)),
                    }));
                    self.inner.entries.write().insert(path.clone(), handle);
                    results.push((path, Ok(())));
                }
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    results.push((path.clone(), Err(ResourceError::NotFound(path))));
                }
                Err(source) => {
                    results.push((
                        path,
                        Err(ResourceError::Io {
                            path: fs_path,
                            source,
                        }),
                    ));
                }
            }
        }

        results
    }
}
