//! # 配置管理模块 - 核心配置类型
//!
//! 应用配置（监听地址、密码、区域、上下文路径、是否监控）和连接配置文件。
//! 两者都支持 JSON 和 TOML 格式，按文件扩展名选择

use crate::error::AdminResult;
use crate::types::{ConnectionOptions, DEFAULT_MONGODB_PORT, MongoUriBuilder};
use rat_logger::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// 默认监听地址
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// 默认监听端口
pub const DEFAULT_PORT: u16 = 1234;

/// 应用配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,
    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,
    /// 管理界面密码
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// 界面语言
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    /// 挂载的上下文路径（不含前导斜杠）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// 是否启用服务器状态监控，只有显式设置为 `false` 时才关闭
    #[serde(default = "default_monitoring")]
    pub monitoring: bool,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_monitoring() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            password: None,
            locale: None,
            context: None,
            monitoring: default_monitoring(),
        }
    }
}

/// 应用配置文件的外层结构 `{ "app": { ... } }`
#[derive(Debug, Default, Serialize, Deserialize)]
struct AppConfigFile {
    #[serde(default)]
    app: AppConfig,
}

impl AppConfig {
    /// 从配置文件加载配置
    ///
    /// 文件不存在或为空时使用默认配置
    ///
    /// # 参数
    ///
    /// * `config_path` - 配置文件路径
    pub fn from_file<P: AsRef<Path>>(config_path: P) -> AdminResult<Self> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            debug!("应用配置文件不存在，使用默认配置: {:?}", config_path);
            return Ok(Self::default());
        }

        let file: AppConfigFile = read_config_file(config_path)?;
        info!("从文件加载应用配置: {:?}", config_path);
        Ok(file.app)
    }

    /// 保存配置到文件
    ///
    /// # 参数
    ///
    /// * `config_path` - 配置文件路径
    pub fn save_to_file<P: AsRef<Path>>(&self, config_path: P) -> AdminResult<()> {
        let file = AppConfigFile { app: self.clone() };
        write_config_file(config_path.as_ref(), &file)?;
        info!("保存应用配置到文件: {:?}", config_path.as_ref());
        Ok(())
    }

    /// 使用进程环境变量覆盖配置
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// 使用给定的变量来源覆盖配置
    ///
    /// 支持 `HOST`、`PORT`、`PASSWORD`、`LOCALE`、`CONTEXT`、`MONITORING`
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = non_empty(lookup("HOST")) {
            self.host = host;
        }
        if let Some(port) = non_empty(lookup("PORT")) {
            match port.parse::<u16>() {
                Ok(port) => self.port = port,
                Err(_) => warn!("环境变量 PORT 不是合法端口，忽略: {}", port),
            }
        }
        if let Some(password) = non_empty(lookup("PASSWORD")) {
            self.password = Some(password);
        }
        if let Some(locale) = non_empty(lookup("LOCALE")) {
            self.locale = Some(locale);
        }
        if let Some(context) = non_empty(lookup("CONTEXT")) {
            self.context = Some(context);
        }
        if let Some(monitoring) = non_empty(lookup("MONITORING")) {
            self.monitoring = !matches!(
                monitoring.to_ascii_lowercase().as_str(),
                "false" | "0" | "no" | "off"
            );
        }
    }

    /// 上下文路径，带前导斜杠；未设置时为空字符串
    pub fn context_path(&self) -> String {
        match self.context.as_deref().map(|c| c.trim_matches('/')) {
            Some(context) if !context.is_empty() => format!("/{}", context),
            _ => String::new(),
        }
    }

    /// 监听地址 `host:port`
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 连接配置文件中的单个连接
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionEntry {
    pub connection_string: String,
    #[serde(default, skip_serializing_if = "ConnectionOptions::is_empty")]
    pub connection_options: ConnectionOptions,
}

impl ConnectionEntry {
    pub fn new<S: Into<String>>(connection_string: S) -> Self {
        Self {
            connection_string: connection_string.into(),
            connection_options: ConnectionOptions::new(),
        }
    }
}

/// 连接配置文件 `{ "connections": { 名称: { connection_string, connection_options } } }`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionsFile {
    #[serde(default)]
    pub connections: BTreeMap<String, ConnectionEntry>,
}

impl ConnectionsFile {
    /// 从文件加载连接配置
    ///
    /// 文件不存在或内容为空时视为没有任何连接
    pub fn from_file<P: AsRef<Path>>(config_path: P) -> AdminResult<Self> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            debug!("连接配置文件不存在: {:?}", config_path);
            return Ok(Self::default());
        }

        let file: ConnectionsFile = read_config_file(config_path)?;
        info!(
            "从文件加载连接配置: {:?}, 共 {} 个连接",
            config_path,
            file.connections.len()
        );
        Ok(file)
    }

    /// 保存连接配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, config_path: P) -> AdminResult<()> {
        write_config_file(config_path.as_ref(), self)?;
        info!("保存连接配置到文件: {:?}", config_path.as_ref());
        Ok(())
    }

    /// 添加或替换一个连接
    pub fn insert<N: Into<String>>(&mut self, name: N, entry: ConnectionEntry) {
        self.connections.insert(name.into(), entry);
    }

    pub fn remove(&mut self, name: &str) -> Option<ConnectionEntry> {
        self.connections.remove(name)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// 使用进程环境变量生成的连接
    pub fn from_env() -> Option<(String, ConnectionEntry)> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// 根据 `CONN_NAME`、`DB_HOST` 等变量生成一个连接
    ///
    /// 只有 `CONN_NAME` 和 `DB_HOST` 都存在时才生成；
    /// 用户名和密码都存在时才带认证信息，带认证时才带数据库名
    pub fn from_env_with<F>(lookup: F) -> Option<(String, ConnectionEntry)>
    where
        F: Fn(&str) -> Option<String>,
    {
        let name = non_empty(lookup("CONN_NAME"))?;
        let host = non_empty(lookup("DB_HOST"))?;

        let port = match non_empty(lookup("DB_PORT")) {
            Some(port) => match port.parse::<u16>() {
                Ok(port) => port,
                Err(_) => {
                    warn!("环境变量 DB_PORT 不是合法端口，使用默认端口: {}", port);
                    DEFAULT_MONGODB_PORT
                }
            },
            None => DEFAULT_MONGODB_PORT,
        };

        let mut builder = MongoUriBuilder::new(host).with_port(port);
        if let (Some(username), Some(password)) = (
            non_empty(lookup("DB_USERNAME")),
            non_empty(lookup("DB_PASSWORD")),
        ) {
            builder = builder.with_auth(username, password);
            if let Some(database) = non_empty(lookup("DB_NAME")) {
                builder = builder.with_database(database);
            }
        }

        Some((name, ConnectionEntry::new(builder.build_uri())))
    }

    /// 文件中没有任何连接时，加入环境变量生成的连接
    pub fn with_env_bootstrap(mut self) -> Self {
        if self.connections.is_empty() {
            if let Some((name, entry)) = Self::from_env() {
                info!("使用环境变量生成连接: {}", name);
                self.connections.insert(name, entry);
            }
        }
        self
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn is_toml(path: &Path) -> bool {
    path.extension().and_then(|s| s.to_str()) == Some("toml")
}

/// 读取配置文件，空文件视为 `{}`
fn read_config_file<T: DeserializeOwned + Default>(path: &Path) -> AdminResult<T> {
    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(T::default());
    }

    if is_toml(path) {
        toml::from_str(&content)
            .map_err(|e| crate::admin_error!(config, format!("解析TOML配置文件失败: {}", e)))
    } else {
        serde_json::from_str(&content)
            .map_err(|e| crate::admin_error!(config, format!("解析JSON配置文件失败: {}", e)))
    }
}

fn write_config_file<T: Serialize>(path: &Path, value: &T) -> AdminResult<()> {
    let content = if is_toml(path) {
        toml::to_string_pretty(value)
            .map_err(|e| crate::admin_error!(config, format!("序列化TOML配置失败: {}", e)))?
    } else {
        serde_json::to_string_pretty(value)
            .map_err(|e| crate::admin_error!(config, format!("序列化JSON配置失败: {}", e)))?
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, content)?;
    Ok(())
}
