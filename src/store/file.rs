//! 文件统计存储
//!
//! 每行一个 JSON 样本的追加写入文件，启动时全部载入内存索引；
//! 清理过期样本时重写文件

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rat_logger::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::{MemoryStatsStore, StatsStore};
use crate::error::{AdminError, AdminResult};
use crate::types::{StatsSample, TimeRange};

/// 持久化的统计存储，重启后数据仍然可用
#[derive(Debug)]
pub struct FileStatsStore {
    path: PathBuf,
    index: MemoryStatsStore,
    /// 写入文件和更新索引都在这把锁内完成
    writer: Mutex<File>,
}

impl FileStatsStore {
    /// 打开（或创建）统计文件
    ///
    /// 文件无法打开或读取时返回错误，这是启动阶段唯一的致命错误；
    /// 无法解析的单行会被跳过，结尾不完整的行会被截掉
    pub async fn open<P: AsRef<Path>>(path: P) -> AdminResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let index = MemoryStatsStore::new();
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                // 崩溃或磁盘写满时留下的半行，截到最后一个换行符
                let complete = content.rfind('\n').map_or(0, |pos| pos + 1);
                if complete < content.len() {
                    warn!(
                        "统计文件 {:?} 结尾有 {} 字节不完整的数据，已截断",
                        path,
                        content.len() - complete
                    );
                    let file = OpenOptions::new().write(true).open(&path).await?;
                    file.set_len(complete as u64).await?;
                    file.sync_all().await?;
                }

                let mut skipped = 0usize;
                for (line_no, line) in content[..complete].lines().enumerate() {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<StatsSample>(line) {
                        Ok(sample) => index.insert(sample),
                        Err(e) => {
                            skipped += 1;
                            debug!("统计文件第{}行无法解析: {}", line_no + 1, e);
                        }
                    }
                }
                if skipped > 0 {
                    warn!("统计文件 {:?} 中有 {} 行无法解析，已跳过", path, skipped);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(AdminError::IoError(e)),
        }

        let writer = Self::open_append(&path).await?;
        info!("打开统计文件: {:?}, 已载入 {} 个样本", path, index.len());

        Ok(Self {
            path,
            index,
            writer: Mutex::new(writer),
        })
    }

    async fn open_append(path: &Path) -> std::io::Result<File> {
        OpenOptions::new().create(true).append(true).open(path).await
    }

    /// 统计文件路径
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 压缩时使用的临时文件路径
    fn compact_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".compact");
        PathBuf::from(name)
    }

    /// 样本总数
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// 把保留的样本写入临时文件并替换统计文件，返回指向新文件的写入句柄
    ///
    /// 失败时原文件保持不变
    async fn write_compacted(&self, samples: &[StatsSample]) -> AdminResult<File> {
        let tmp_path = self.compact_path();
        let mut content = String::new();
        for sample in samples {
            content.push_str(&serde_json::to_string(sample)?);
            content.push('\n');
        }

        let result = async {
            tokio::fs::write(&tmp_path, content).await?;
            // 改名之前打开，改名之后句柄跟随新文件
            let file = Self::open_append(&tmp_path).await?;
            tokio::fs::rename(&tmp_path, &self.path).await?;
            Ok::<File, std::io::Error>(file)
        }
        .await;

        match result {
            Ok(file) => Ok(file),
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_file(&tmp_path).await {
                    debug!("删除临时文件 {:?} 失败: {}", tmp_path, cleanup);
                }
                Err(crate::admin_error!(store, format!("压缩统计文件失败: {}", e)))
            }
        }
    }
}

async fn append_line(writer: &mut File, line: &[u8]) -> std::io::Result<()> {
    writer.write_all(line).await?;
    writer.flush().await
}

#[async_trait]
impl StatsStore for FileStatsStore {
    async fn record(&self, sample: &StatsSample) -> AdminResult<()> {
        let mut line = serde_json::to_string(sample)?;
        line.push('\n');

        let mut writer = self.writer.lock().await;
        let offset = writer
            .metadata()
            .await
            .map_err(|e| crate::admin_error!(store, format!("读取统计文件长度失败: {}", e)))?
            .len();

        if let Err(e) = append_line(&mut writer, line.as_bytes()).await {
            // 回滚到写入前的长度，文件中不留半行
            if let Err(rollback) = writer.set_len(offset).await {
                error!("统计文件回滚失败: {}", rollback);
            }
            return Err(crate::admin_error!(store, format!("写入统计文件失败: {}", e)));
        }

        self.index.insert(sample.clone());
        Ok(())
    }

    async fn query(&self, connection_name: &str, range: TimeRange) -> Vec<StatsSample> {
        self.index.query_sync(connection_name, range)
    }

    async fn latest(&self, connection_name: &str) -> Option<StatsSample> {
        self.index.latest_sync(connection_name)
    }

    async fn oldest(&self) -> Option<DateTime<Utc>> {
        self.index.oldest_sync()
    }

    async fn prune_before(&self, cutoff: DateTime<Utc>) -> AdminResult<usize> {
        // 持有写锁，压缩期间没有新样本写入
        let mut writer = self.writer.lock().await;
        let kept: Vec<StatsSample> = self
            .index
            .all_samples()
            .into_iter()
            .filter(|s| s.timestamp >= cutoff)
            .collect();
        if kept.len() == self.index.len() {
            return Ok(0);
        }

        // 新文件就绪之后再清理索引，失败时文件和索引保持一致
        *writer = self.write_compacted(&kept).await?;
        let removed = self.index.prune_sync(cutoff);
        debug!("统计文件已压缩，删除 {} 个过期样本", removed);
        Ok(removed)
    }
}
