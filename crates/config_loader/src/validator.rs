//! 配置校验模块
//!
//! 校验规则：
//! - 数值范围 (validator derive)
//! - extractor / sink 名称非空且不重复
//! - HTTP 回调地址必须是合法的 http(s) URL
//! - HBase REST 地址必须是合法的 http(s) URL
//!
//! 非致命问题 (例如停止高度不大于起始高度) 由 [`warnings`] 返回。

use std::collections::HashSet;

use contracts::{ContractError, PipelineBlueprint};
use url::Url;
use validator::Validate;

/// 校验 PipelineBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    validate_ranges(blueprint)?;
    validate_selection("pipeline.extractors", &blueprint.pipeline.extractors)?;
    validate_selection("pipeline.sinks", &blueprint.pipeline.sinks)?;
    validate_http_endpoints(blueprint)?;
    validate_hbase_url(blueprint)?;
    Ok(())
}

/// 收集非致命的配置警告
pub fn warnings(blueprint: &PipelineBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();
    let pipeline = &blueprint.pipeline;

    if let Some(stop) = pipeline.stop_block_num {
        if stop <= pipeline.start_block_num {
            warnings.push(format!(
                "stop_block_num ({stop}) <= start_block_num ({}) - the pipeline will never stop on its own",
                pipeline.start_block_num
            ));
        }
    }

    if pipeline.extractors.is_empty() {
        warnings.push("No extractors selected - no records will be produced".to_string());
    }
    if pipeline.sinks.is_empty() {
        warnings.push("No sinks selected - records will be dropped".to_string());
    }

    let selected = |name: &str| pipeline.sinks.iter().any(|s| s == name);
    if selected("http") && blueprint.sinks.http.endpoints.is_empty() {
        warnings.push("Sink 'http' selected but sinks.http.endpoints is empty".to_string());
    }
    if selected("kafka") && blueprint.sinks.kafka.brokers.is_empty() {
        warnings.push("Sink 'kafka' selected but sinks.kafka.brokers is empty".to_string());
    }
    if selected("hbase") && blueprint.sinks.hbase.rest_url.is_none() {
        warnings.push("Sink 'hbase' selected but sinks.hbase.rest_url is not set".to_string());
    }

    warnings
}

/// 校验数值范围
fn validate_ranges(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    blueprint
        .validate()
        .map_err(|e| ContractError::config_validation("blueprint", e.to_string()))
}

/// 校验名称列表：非空且唯一
fn validate_selection(field: &str, names: &[String]) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, name) in names.iter().enumerate() {
        if name.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("{field}[{idx}]"),
                "name cannot be empty",
            ));
        }
        if !seen.insert(name.as_str()) {
            return Err(ContractError::config_validation(
                format!("{field}[{idx}]"),
                format!("duplicate name '{name}'"),
            ));
        }
    }
    Ok(())
}

/// 校验 HTTP 回调地址
fn validate_http_endpoints(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    for (idx, endpoint) in blueprint.sinks.http.endpoints.iter().enumerate() {
        check_http_url(&format!("sinks.http.endpoints[{idx}]"), endpoint)?;
    }
    Ok(())
}

/// 校验 HBase REST 地址
fn validate_hbase_url(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    match &blueprint.sinks.hbase.rest_url {
        Some(url) => check_http_url("sinks.hbase.rest_url", url),
        None => Ok(()),
    }
}

fn check_http_url(field: &str, raw: &str) -> Result<(), ContractError> {
    let url = Url::parse(raw)
        .map_err(|e| ContractError::config_validation(field, format!("invalid url '{raw}': {e}")))?;
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ContractError::config_validation(
                field,
                format!("unsupported scheme '{other}', expected http or https"),
            ))
        }
    }
    if url.host_str().is_none() {
        return Err(ContractError::config_validation(
            field,
            format!("url '{raw}' has no host"),
        ));
    }
    Ok(())
}
