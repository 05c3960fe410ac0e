use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Заводской цвет кузова (Cajun Red)
pub const DEFAULT_PAINT_COLOR: &str = "#e20407";

/// Значение выбора детали, означающее «без замены»
pub const DEFAULT_PART: &str = "default";

/// Команда, приходящая по каналу встраивания: `{ "type": ..., "payload": ... }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    /// Покрасить кузов
    ChangeColor { color: String },
    /// Вернуть исходные материалы и заводской цвет
    ResetColor,
    /// Заменить узел категории деталью из каталога
    ReplacePart {
        category: String,
        #[serde(rename = "partId")]
        part_id: String,
    },
    /// Вернуть оригинальные узлы категории
    ResetPart { category: String },
    /// Сменить пресет окружения (HDRI)
    ChangeHdri { hdri: String },
    /// Записать выбор детали без изменения сцены
    UpdateModel { part: String, value: String },
    /// Массовое обновление выбранных деталей
    LoadConfiguration(BTreeMap<String, String>),
    /// Запросить текущее состояние конфигурации
    RequestCurrentState,
}

impl Command {
    /// Имя типа команды в формате канала
    pub fn type_name(&self) -> &'static str {
        match self {
            Command::ChangeColor { .. } => "CHANGE_COLOR",
            Command::ResetColor => "RESET_COLOR",
            Command::ReplacePart { .. } => "REPLACE_PART",
            Command::ResetPart { .. } => "RESET_PART",
            Command::ChangeHdri { .. } => "CHANGE_HDRI",
            Command::UpdateModel { .. } => "UPDATE_MODEL",
            Command::LoadConfiguration(_) => "LOAD_CONFIGURATION",
            Command::RequestCurrentState => "REQUEST_CURRENT_STATE",
        }
    }
}

/// Статус подтверждения
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    Success,
    Error,
}

/// Исходящее подтверждение: `{ type, status, data | message }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ack {
    #[serde(rename = "type")]
    pub kind: String,
    pub status: AckStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Ack {
    pub fn success(kind: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            status: AckStatus::Success,
            data: Some(data),
            message: None,
        }
    }

    /// Ошибка всегда уходит с типом `ERROR`
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: "ERROR".to_string(),
            status: AckStatus::Error,
            data: None,
            message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == AckStatus::Success
    }
}

/// Опубликованный артефакт, адресуемый по хешу содержимого
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedArtifact {
    pub content_hash: String,
    pub glb_location: String,
    pub usdz_location: String,
}

/// Набор AR-ссылок для опубликованной конфигурации
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArLinks {
    /// Intent-ссылка Scene Viewer (Android)
    pub android: Option<String>,
    /// Прямая ссылка на USDZ (AR Quick Look, iOS)
    pub ios: Option<String>,
    /// Самодостаточный HTML-документ в виде data URL
    pub universal: String,
    pub config_hash: String,
}

/// Результат публикации, отдаваемый вызывающему коду
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishResult {
    #[serde(flatten)]
    pub artifact: PublishedArtifact,
    /// Артефакт уже существовал в хранилище
    pub reused: bool,
    pub links: ArLinks,
}

/// Платформа клиента, определённая по строке User-Agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Android,
    Unsupported,
}

/// Куда направить клиента при запуске AR
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchDecision {
    pub platform: Platform,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

/// Пресет освещения/фона
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EnvironmentPreset {
    pub id: &'static str,
    pub name: &'static str,
    pub file: &'static str,
    /// Проецируемая «земля» под моделью
    pub ground: bool,
}

pub const ENVIRONMENT_PRESETS: &[EnvironmentPreset] = &[
    EnvironmentPreset {
        id: "neutral",
        name: "Neutral Studio",
        file: "/hdr/lightroom_14b.hdr",
        ground: false,
    },
    EnvironmentPreset {
        id: "sunset",
        name: "Sunset",
        file: "/hdr/passendorf_snow.hdr",
        ground: true,
    },
    EnvironmentPreset {
        id: "warehouse",
        name: "Warehouse",
        file: "/hdr/goegap.hdr",
        ground: true,
    },
    EnvironmentPreset {
        id: "snow",
        name: "Snow",
        file: "/hdr/minedump_flats.hdr",
        ground: true,
    },
];

/// Пресет по умолчанию
pub const DEFAULT_ENVIRONMENT: &str = "neutral";

/// Найти пресет окружения по идентификатору
pub fn environment_preset(id: &str) -> Option<&'static EnvironmentPreset> {
    ENVIRONMENT_PRESETS.iter().find(|p| p.id == id)
}

/// Снимок конфигурации для внешнего наблюдателя
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationSummary {
    pub paint_color: String,
    pub selected_parts: BTreeMap<String, String>,
    pub selected_environment: String,
    pub content_hash: String,
    pub replaced_parts: Vec<String>,
    pub hidden_parts: Vec<String>,
    pub high_detail: bool,
    pub is_loading: bool,
    pub is_exporting: bool,
}
