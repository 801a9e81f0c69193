// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Nereid and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

fn render_error(err: RenderError) -> ErrorData {
    ErrorData::invalid_params(
        err.to_string(),
        Some(serde_json::json!({
            "kind": err.kind(),
            "line": err.line(),
        })),
    )
}

fn store_error(err: StoreError) -> ErrorData {
    match err.kind() {
        StoreErrorKind::NotFound => ErrorData::resource_not_found(err.to_string(), None),
        StoreErrorKind::Conflict => ErrorData::invalid_params(err.to_string(), None),
        StoreErrorKind::Storage => {
            warn!(error = %err, "history storage failure");
            ErrorData::internal_error(err.to_string(), None)
        }
    }
}

fn parse_collection_filter(raw: Option<String>) -> Result<Option<CollectionName>, ErrorData> {
    raw.map(|name| {
        CollectionName::new(&name).map_err(|err| {
            ErrorData::invalid_params(
                format!("invalid collection: {err}"),
                Some(serde_json::json!({ "collection": name })),
            )
        })
    })
    .transpose()
}

fn history_entry(entry: &DiagramEntry) -> HistoryEntry {
    HistoryEntry {
        id: entry.id().to_string(),
        title: entry.title().to_owned(),
        collection: entry.collection().map(|name| name.as_str().to_owned()),
        diagram: entry.diagram().to_owned(),
        created_at: entry.created_at().to_rfc3339(),
        updated_at: entry.updated_at().to_rfc3339(),
    }
}
