//! User-facing messages in the workspace language.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lang {
    #[default]
    #[serde(rename = "en_US")]
    EnUs,
    #[serde(rename = "zh_CN")]
    ZhCn,
}

impl Lang {
    pub fn read_only_denied(&self) -> &'static str {
        match self {
            Lang::EnUs => "Read-only mode, this operation is not allowed",
            Lang::ZhCn => "只读模式下不支持该操作",
        }
    }

    pub fn forbidden(&self) -> &'static str {
        match self {
            Lang::EnUs => "Insufficient permissions to access this resource",
            Lang::ZhCn => "没有访问该资源的权限",
        }
    }

    pub fn invalid_access_code(&self) -> &'static str {
        match self {
            Lang::EnUs => "Access authorization code is incorrect",
            Lang::ZhCn => "访问授权码错误",
        }
    }
}
