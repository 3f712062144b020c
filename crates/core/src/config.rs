use std::path::PathBuf;

/// Process-wide settings, loaded once from the environment at startup.
///
/// Field names and defaults mirror the env var table in the external
/// interface design: this is the single place environment variables are
/// read, so every other module takes a `&Settings` rather than calling
/// `std::env::var` itself.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_host: String,
    pub api_port: u16,

    pub model_path: String,
    pub tensor_parallel_size: u32,
    pub gpu_memory_utilization: f64,
    pub max_model_len: u32,
    pub enforce_eager: bool,

    /// Durable task store location (sqlite file path).
    pub database_url: String,
    /// Broker URL, accepted for config-surface parity; unused by the
    /// in-process channel broker.
    pub redis_url: String,
    pub storage_dir: PathBuf,
    /// Task queue name, accepted for config-surface parity.
    pub celery_queue: String,

    pub pdf_max_concurrency: usize,
    pub base_size: u32,
    pub image_size: u32,
    pub crop_mode: bool,
    pub image_prompt: String,
    pub pdf_prompt: String,

    pub internal_api_token: String,
    /// If set, the inference client uses the remote HTTP backend.
    pub worker_remote_infer_url: Option<String>,
    /// If set and the path exists, the subprocess PDF backend is used
    /// instead of the in-process one.
    pub pdf_worker_bin: Option<PathBuf>,

    pub max_upload_size_mb: u64,

    /// Rendering DPI for PDF pages (zoom = dpi / 72).
    pub pdf_render_dpi: f32,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}

impl Settings {
    /// Load settings from the environment, applying the documented defaults
    /// for anything unset.
    pub fn from_env() -> Self {
        Self {
            api_host: env_or("API_HOST", "0.0.0.0"),
            api_port: env_parse("API_PORT", 8001),

            model_path: env_or("MODEL_PATH", "deepseek-ai/DeepSeek-OCR"),
            tensor_parallel_size: env_parse("TENSOR_PARALLEL_SIZE", 1),
            gpu_memory_utilization: env_parse("GPU_MEMORY_UTILIZATION", 0.75),
            max_model_len: env_parse("MAX_MODEL_LEN", 8192),
            enforce_eager: env_bool("ENFORCE_EAGER", false),

            database_url: env_or("DATABASE_URL", "./data/ocr.db"),
            redis_url: env_or("REDIS_URL", "redis://redis:6379/0"),
            storage_dir: PathBuf::from(env_or("STORAGE_DIR", "./data")),
            celery_queue: env_or("CELERY_QUEUE", "ocr_tasks"),

            pdf_max_concurrency: env_parse("PDF_MAX_CONCURRENCY", 20),
            base_size: env_parse("BASE_SIZE", 1024),
            image_size: env_parse("IMAGE_SIZE", 640),
            crop_mode: env_bool("CROP_MODE", true),
            image_prompt: env_or("IMAGE_PROMPT", "<image>\nFree OCR."),
            pdf_prompt: env_or(
                "PDF_PROMPT",
                "<image>\n<|grounding|>Convert the document to markdown.",
            ),

            internal_api_token: env_or("INTERNAL_API_TOKEN", "deepseek-internal-token"),
            worker_remote_infer_url: std::env::var("WORKER_REMOTE_INFER_URL").ok(),
            pdf_worker_bin: std::env::var("PDF_WORKER_BIN").ok().map(PathBuf::from),

            max_upload_size_mb: env_parse("MAX_UPLOAD_SIZE_MB", 100),
            pdf_render_dpi: env_parse("PDF_RENDER_DPI", 144.0),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Whether the remote HTTP inference backend should be used, per
/// `WORKER_REMOTE_INFER_URL`.
pub fn uses_remote_inference(settings: &Settings) -> bool {
    settings.worker_remote_infer_url.is_some()
}

/// Whether the subprocess PDF backend should be used: `PDF_WORKER_BIN` is
/// set and points at an existing file.
pub fn uses_subprocess_pdf_backend(settings: &Settings) -> bool {
    settings
        .pdf_worker_bin
        .as_ref()
        .is_some_and(|p| p.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        // SAFETY: single-threaded test, no concurrent env mutation.
        for key in [
            "API_HOST", "API_PORT", "MODEL_PATH", "PDF_MAX_CONCURRENCY", "BASE_SIZE",
            "IMAGE_SIZE", "CROP_MODE", "WORKER_REMOTE_INFER_URL", "PDF_WORKER_BIN",
        ] {
            unsafe { std::env::remove_var(key) };
        }
        let settings = Settings::from_env();
        assert_eq!(settings.api_host, "0.0.0.0");
        assert_eq!(settings.api_port, 8001);
        assert_eq!(settings.pdf_max_concurrency, 20);
        assert_eq!(settings.base_size, 1024);
        assert_eq!(settings.image_size, 640);
        assert!(settings.crop_mode);
        assert!(!uses_remote_inference(&settings));
        assert!(!uses_subprocess_pdf_backend(&settings));
    }
}
