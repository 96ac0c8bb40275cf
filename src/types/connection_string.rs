//! 连接字符串语法校验
//!
//! 注册连接时在任何网络IO之前同步执行，只做语法检查：
//! 协议、主机、可选的认证信息与端口、可选的数据库名与查询参数

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::AdminResult;

/// 合法主机名：域名、IPv4或者方括号包裹的IPv6
static HOST_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\[[0-9A-Fa-f:.]+\]|[A-Za-z0-9_]([A-Za-z0-9_\-.]*[A-Za-z0-9_])?)$")
        .expect("主机名正则表达式非法")
});

/// 连接协议
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scheme {
    /// mongodb://
    Standard,
    /// mongodb+srv://
    Srv,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Standard => "mongodb",
            Scheme::Srv => "mongodb+srv",
        }
    }
}

/// 主机地址
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostAddress {
    pub host: String,
    pub port: Option<u16>,
}

impl fmt::Display for HostAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}:{}", self.host, port),
            None => write!(f, "{}", self.host),
        }
    }
}

/// 解析后的连接字符串
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionString {
    raw: String,
    pub scheme: Scheme,
    pub username: Option<String>,
    pub password: Option<String>,
    pub hosts: Vec<HostAddress>,
    pub database: Option<String>,
    pub options: BTreeMap<String, String>,
}

impl ConnectionString {
    /// 解析并校验连接字符串
    pub fn parse(input: &str) -> AdminResult<Self> {
        let raw = input.trim();
        if raw.is_empty() {
            return Err(crate::admin_error!(invalid_uri, "连接字符串为空"));
        }

        let (scheme, rest) = if let Some(rest) = raw.strip_prefix("mongodb+srv://") {
            (Scheme::Srv, rest)
        } else if let Some(rest) = raw.strip_prefix("mongodb://") {
            (Scheme::Standard, rest)
        } else {
            return Err(crate::admin_error!(
                invalid_uri,
                "连接字符串必须以 mongodb:// 或 mongodb+srv:// 开头"
            ));
        };

        // 拆分查询参数
        let (rest, query) = match rest.split_once('?') {
            Some((head, query)) => (head, Some(query)),
            None => (rest, None),
        };

        // 认证信息只能出现在第一个 '/' 之前，密码中的 '@' 必须经过编码
        let (authority, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], Some(&rest[idx + 1..])),
            None => (rest, None),
        };

        let (userinfo, host_list) = match authority.rsplit_once('@') {
            Some((userinfo, hosts)) => (Some(userinfo), hosts),
            None => (None, authority),
        };

        let (username, password) = match userinfo {
            Some(info) => Self::parse_userinfo(info)?,
            None => (None, None),
        };

        let hosts = Self::parse_hosts(host_list, scheme)?;

        let database = match path {
            Some(db) if !db.is_empty() => {
                let decoded = decode_component(db, "数据库名")?;
                if decoded.contains(['/', '\\', ' ', '"', '$']) {
                    return Err(crate::admin_error!(
                        invalid_uri,
                        format!("数据库名 '{}' 包含非法字符", decoded)
                    ));
                }
                Some(decoded)
            }
            _ => None,
        };

        let options = match query {
            Some(q) => Self::parse_options(q)?,
            None => BTreeMap::new(),
        };

        Ok(Self {
            raw: raw.to_string(),
            scheme,
            username,
            password,
            hosts,
            database,
            options,
        })
    }

    fn parse_userinfo(info: &str) -> AdminResult<(Option<String>, Option<String>)> {
        if info.is_empty() {
            return Err(crate::admin_error!(invalid_uri, "认证信息为空"));
        }
        let (user, pass) = match info.split_once(':') {
            Some((user, pass)) => (user, Some(pass)),
            None => (info, None),
        };
        if user.is_empty() {
            return Err(crate::admin_error!(invalid_uri, "用户名不能为空"));
        }
        let username = decode_component(user, "用户名")?;
        let password = pass.map(|p| decode_component(p, "密码")).transpose()?;
        Ok((Some(username), password))
    }

    fn parse_hosts(host_list: &str, scheme: Scheme) -> AdminResult<Vec<HostAddress>> {
        if host_list.is_empty() {
            return Err(crate::admin_error!(invalid_uri, "缺少主机地址"));
        }

        let mut hosts = Vec::new();
        for part in host_list.split(',') {
            if part.is_empty() {
                return Err(crate::admin_error!(invalid_uri, "主机列表中存在空项"));
            }

            // IPv6 地址的端口在右方括号之后
            let (host, port) = if part.starts_with('[') {
                match part.find(']') {
                    Some(end) => {
                        let host = &part[..=end];
                        let tail = &part[end + 1..];
                        match tail.strip_prefix(':') {
                            Some(port) => (host, Some(port)),
                            None if tail.is_empty() => (host, None),
                            None => {
                                return Err(crate::admin_error!(
                                    invalid_uri,
                                    format!("主机地址 '{}' 格式错误", part)
                                ));
                            }
                        }
                    }
                    None => {
                        return Err(crate::admin_error!(
                            invalid_uri,
                            format!("IPv6 地址 '{}' 缺少右方括号", part)
                        ));
                    }
                }
            } else {
                match part.split_once(':') {
                    Some((host, port)) => (host, Some(port)),
                    None => (part, None),
                }
            };

            if !HOST_PATTERN.is_match(host) {
                return Err(crate::admin_error!(
                    invalid_uri,
                    format!("主机名 '{}' 非法", host)
                ));
            }

            let port = match port {
                Some(p) => Some(parse_port(p)?),
                None => None,
            };

            hosts.push(HostAddress {
                host: host.to_string(),
                port,
            });
        }

        if scheme == Scheme::Srv {
            if hosts.len() != 1 {
                return Err(crate::admin_error!(
                    invalid_uri,
                    "mongodb+srv 只能指定一个主机"
                ));
            }
            if hosts[0].port.is_some() {
                return Err(crate::admin_error!(invalid_uri, "mongodb+srv 不能指定端口"));
            }
        }

        Ok(hosts)
    }

    fn parse_options(query: &str) -> AdminResult<BTreeMap<String, String>> {
        let mut options = BTreeMap::new();
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                crate::admin_error!(invalid_uri, format!("连接参数 '{}' 缺少 '='", pair))
            })?;
            if key.is_empty() {
                return Err(crate::admin_error!(invalid_uri, "连接参数名为空"));
            }
            options.insert(key.to_string(), decode_component(value, "连接参数")?);
        }
        Ok(options)
    }

    /// 原始连接字符串
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// 第一个主机，用于日志和状态展示
    pub fn primary_host(&self) -> &HostAddress {
        &self.hosts[0]
    }

    /// 隐藏密码后的连接字符串，用于日志输出
    pub fn redacted(&self) -> String {
        let mut uri = format!("{}://", self.scheme.as_str());
        if let Some(user) = &self.username {
            uri.push_str(&urlencoding::encode(user));
            if self.password.is_some() {
                uri.push_str(":****");
            }
            uri.push('@');
        }
        let hosts: Vec<String> = self.hosts.iter().map(|h| h.to_string()).collect();
        uri.push_str(&hosts.join(","));
        if let Some(db) = &self.database {
            uri.push('/');
            uri.push_str(db);
        }
        uri
    }
}

impl fmt::Display for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

fn parse_port(port: &str) -> AdminResult<u16> {
    match port.parse::<u16>() {
        Ok(p) if p > 0 => Ok(p),
        _ => Err(crate::admin_error!(
            invalid_uri,
            format!("端口 '{}' 非法", port)
        )),
    }
}

fn decode_component(value: &str, what: &str) -> AdminResult<String> {
    urlencoding::decode(value)
        .map(|v| v.into_owned())
        .map_err(|e| crate::admin_error!(invalid_uri, format!("{}解码失败: {}", what, e)))
}
