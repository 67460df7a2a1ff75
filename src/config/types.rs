use crate::browser::Locator;
use crate::extract::{FieldSpec, LookupStrategy};
use crate::model::Column;
use serde::{Deserialize, Serialize};

/// Main configuration structure
///
/// Every section has defaults for the MINEDUC advanced-search site, so an
/// empty file (or no file) yields a working configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub site: SiteConfig,
    pub browser: BrowserConfig,
    pub crawl: CrawlConfig,
    pub output: OutputConfig,

    /// Extracted fields, in extraction order
    #[serde(rename = "field")]
    pub fields: Vec<FieldSpec>,
}

/// Addresses and selectors of the registry site
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SiteConfig {
    /// Advanced-search page holding the region and comuna selectors
    pub base_url: String,

    /// Detail page address; `{code}` is replaced with the school code
    pub detail_url_template: String,

    /// The region `<select>`
    pub region_select: String,

    /// The comuna `<select>`, repopulated whenever a region is chosen
    pub comuna_select: String,

    /// Control that submits the search
    pub search_button: String,

    /// Container that appears once results are rendered
    pub results_table: String,

    /// Links to schools inside the result list
    pub result_links: String,

    /// Substring an `onclick` handler must contain to be a school link
    pub link_marker: String,

    /// Regex with one capture group for the school code
    pub code_pattern: String,

    /// Label of the synthetic "all" option
    pub all_option_label: String,

    /// Value of the synthetic "all comunas" option
    pub all_comuna_value: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://mi.mineduc.cl/mime-web/mvc/mime/busqueda_avanzada".to_string(),
            detail_url_template: "https://mi.mineduc.cl/mime-web/mvc/mime/ficha?rbd={code}"
                .to_string(),
            region_select: "#region".to_string(),
            comuna_select: "#comuna".to_string(),
            search_button: "a.boton_caja[onclick*='EnviaBusqueda']".to_string(),
            results_table: "#busqueda_avanzada".to_string(),
            result_links: "table#busqueda_avanzada tbody tr a".to_string(),
            link_marker: "document.fichaescuela".to_string(),
            code_pattern: r"value='(\d+)'".to_string(),
            all_option_label: "Todas".to_string(),
            all_comuna_value: "0".to_string(),
        }
    }
}

impl SiteConfig {
    /// Selector for the options of the region `<select>`
    pub fn region_options(&self) -> String {
        format!("{} option", self.region_select)
    }

    /// Selector for the options of the comuna `<select>`
    pub fn comuna_options(&self) -> String {
        format!("{} option", self.comuna_select)
    }

    /// Builds the detail page address for a school code
    pub fn detail_url(&self, code: &str) -> String {
        self.detail_url_template.replace("{code}", code)
    }
}

/// Browser session behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BrowserConfig {
    /// Upper bound for every readiness wait (seconds)
    pub wait_timeout_secs: u64,

    /// Pause after selections and clicks so dynamic content can load (milliseconds)
    pub settle_delay_ms: u64,

    pub window_width: u32,
    pub window_height: u32,

    /// Launch Chrome with `--no-sandbox`
    pub no_sandbox: bool,

    /// Selector that marks a detail page as loaded
    pub detail_ready: String,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            wait_timeout_secs: 10,
            settle_delay_ms: 1500,
            window_width: 1920,
            window_height: 1080,
            no_sandbox: true,
            detail_ready: "body".to_string(),
        }
    }
}

/// Crawl controller behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlConfig {
    /// Records between checkpoint saves and intermediate exports
    pub checkpoint_interval: usize,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            checkpoint_interval: 10,
        }
    }
}

/// Output locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Well-known checkpoint location
    pub checkpoint_path: String,

    /// Final export, written only on normal completion
    pub export_path: String,

    /// Export written at checkpoints and on abnormal termination
    pub intermediate_export_path: String,

    /// Export written by pilot runs
    pub pilot_export_path: String,

    /// Persistent log file
    pub log_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            checkpoint_path: "scraper_progress.json".to_string(),
            export_path: "colegios_chile.csv".to_string(),
            intermediate_export_path: "colegios_chile_intermediate.csv".to_string(),
            pilot_export_path: "colegios_piloto.csv".to_string(),
            log_path: "mineduc_harvest.log".to_string(),
        }
    }
}

/// Field lookups for the registry's detail page
pub fn default_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::new(
            Column::Name,
            vec![LookupStrategy::Selector {
                selector: "div.titulo_color td".to_string(),
            }],
        ),
        FieldSpec::new(Column::Address, vec![LookupStrategy::cell("Dirección:")]),
        FieldSpec::new(Column::Phone, vec![LookupStrategy::cell("Teléfono:")]),
        FieldSpec::new(Column::Email, vec![LookupStrategy::cell("E-mail contacto:")]),
        FieldSpec::new(Column::Website, vec![LookupStrategy::cell("Página web:")]),
        FieldSpec::new(Column::Director, vec![LookupStrategy::cell("Director(a):")]),
        FieldSpec::new(Column::Operator, vec![LookupStrategy::cell("Sostenedor:")]),
        FieldSpec::new(
            Column::TotalEnrollment,
            vec![
                LookupStrategy::LabelSibling {
                    label_tag: "div".to_string(),
                    label: "Matrícula total de alumnos:".to_string(),
                    value_tag: "div".to_string(),
                    value_class: Some("form_detalle".to_string()),
                },
                LookupStrategy::cell("Matrícula total de alumnos:"),
            ],
        )
        .expanding(Locator::link_text("Información institucional")),
    ]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            site: SiteConfig::default(),
            browser: BrowserConfig::default(),
            crawl: CrawlConfig::default(),
            output: OutputConfig::default(),
            fields: default_fields(),
        }
    }
}

impl Config {
    /// SHA-256 (hex) of the effective configuration rendered as TOML
    pub fn fingerprint(&self) -> Result<String, crate::ConfigError> {
        super::parser::compute_config_hash(self)
    }
}
