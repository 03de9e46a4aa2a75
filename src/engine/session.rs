//! The form session: owned state, an event reducer, and effect plumbing.
//!
//! One session interprets one form design. Hosts feed [`FormEvent`]s in,
//! execute the returned [`Effect`]s, and read the composed [`FormTree`]
//! back out. Sub-forms are nested sessions behind [`SubFormSession`];
//! their events arrive wrapped in [`FormEvent::Sub`].

use std::collections::VecDeque;

use serde_json::{Map, Value, json};

use crate::engine::dispatch;
use crate::engine::effect::{Effect, FormSignal};
use crate::engine::layout::{ComposeCtx, compose};
use crate::engine::node::{FormTree, OverlayNode, UploadState};
use crate::engine::options;
use crate::engine::rules::{FormMode, check_rules, hidden_fields, is_field_required};
use crate::engine::state::SessionState;
use crate::engine::subform::{MAX_SUBFORM_DEPTH, SubFormKind, SubFormSession};
use crate::engine::table::RowSet;
use crate::engine::value::{evaluate_default, generate_control_value, generate_params};
use crate::engine::values::ValueSource;
use crate::error::EngineError;
use crate::schema::{FormDesign, InputType, PageData, RowAction, row_action};
use crate::services::models::{TxRequest, TxResponse, UploadOutcome};
use crate::services::traits::Services;

const DEFAULT_PAGE_SIZE: u64 = 10;

/// Everything that can happen to a form session.
#[derive(Debug)]
pub enum FormEvent {
    /// Direct user edit of a bound field.
    ValueEdited { column_key: String, value: Value },
    TabSelected { layout_id: String, index: usize },
    SearchEdited { text: String },
    SearchSubmitted,
    PageRequested { index: u64 },
    SearchLoaded { seq: u64, result: anyhow::Result<PageData<Value>> },
    OptionsLoaded { column_key: String, generation: u64, result: anyhow::Result<Vec<Value>> },
    ControlValueResolved {
        column_key: String,
        generation: u64,
        result: anyhow::Result<Option<Value>>,
    },
    ButtonClicked { code: String },
    /// Double-click on a search-result row.
    RowActivated { index: usize },
    DetailFetched { txcode: String, generation: u64, result: anyhow::Result<TxResponse> },
    /// A backend record arrived (detail pages, modify mode).
    RecordLoaded { record: Map<String, Value> },
    TableRowAdded { column_key: String, key: String },
    TableRowDeleted { column_key: String, index: usize },
    TableRowRenamed { column_key: String, index: usize, key: String },
    TableCellEdited { column_key: String, index: usize, cell: String, value: Value },
    FileChosen { column_key: String, file_name: String, bytes: Vec<u8> },
    FileUploaded { column_key: String, generation: u64, result: anyhow::Result<UploadOutcome> },
    FileRemoved { column_key: String },
    FileRemoveFinished { result: anyhow::Result<()> },
    /// Browse pressed on a lookup field.
    LookupOpened { column_key: String },
    SameMainOpened,
    AdvancedToggled,
    SubFormLoaded { generation: u64, kind: SubFormKind, result: anyhow::Result<FormDesign> },
    SubFormClosed,
    /// An event addressed to the mounted sub-form.
    Sub(Box<FormEvent>),
    SubmitRequested,
}

/// One interpreted form.
pub struct FormSession {
    design: FormDesign,
    state: SessionState,
    services: Services,
    language: String,
    depth: usize,
    sub: Option<Box<SubFormSession>>,
}

/// Route a sub-form effect's events back through the parent.
fn map_sub(effect: Effect<FormEvent>) -> Effect<FormEvent> {
    match effect {
        Effect::None => Effect::None,
        Effect::Batch(effects) => Effect::Batch(effects.into_iter().map(map_sub).collect()),
        Effect::Perform(future) => Effect::Perform(Box::pin(async move {
            FormEvent::Sub(Box::new(future.await))
        })),
        // Signals bubble out unchanged; the host sees one stream.
        Effect::Signal(signal) => Effect::Signal(signal),
    }
}

impl FormSession {
    pub fn new(
        design: FormDesign,
        services: Services,
        language: impl Into<String>,
        mode: FormMode,
    ) -> FormSession {
        FormSession {
            design,
            state: SessionState::new(mode),
            services,
            language: language.into(),
            depth: 0,
            sub: None,
        }
    }

    pub fn design(&self) -> &FormDesign {
        &self.design
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn sub_form(&self) -> Option<&SubFormSession> {
        self.sub.as_deref()
    }

    /// Seed defaults, inject table rows, and queue the initial async work:
    /// the control-value resolution (first rule-bearing field only) and one
    /// option fetch per select without inline options.
    pub fn bootstrap(&mut self) -> Effect<FormEvent> {
        let mut defaults = Vec::new();
        let mut table_plans = Vec::new();
        let mut option_plans = Vec::new();
        let mut control_key: Option<String> = None;

        for input in self.design.inputs() {
            let key = input.column_key();
            if key.is_empty() {
                continue;
            }
            if let Some(expr) = &input.config.data_default {
                defaults.push((key.to_string(), evaluate_default(expr)));
            }
            match &input.input_type {
                InputType::TableDynamic => {
                    table_plans.push((key.to_string(), input.config.default_keys.clone()));
                }
                InputType::Select if options::needs_fetch(&input.config) => {
                    option_plans.push((key.to_string(), input.config.clone()));
                }
                _ => {}
            }
            if control_key.is_none() && self.design.rules.run_fo_for(key).is_some() {
                control_key = Some(key.to_string());
            }
        }

        for (key, value) in defaults {
            self.state.values.apply(&key, value, ValueSource::Default);
        }

        for (key, mains) in table_plans {
            let existing = match self.state.values.get(&key) {
                Some(Value::Array(rows)) => rows.clone(),
                _ => Vec::new(),
            };
            let set = RowSet::from_schema(&mains, &existing);
            self.state.values.apply(&key, set.to_value(), ValueSource::Default);
            self.state.tables.insert(key, set);
        }

        let mut effects = Vec::new();
        let generation = self.state.generation();

        if let Some(key) = control_key {
            if !self.state.control_value_fetched {
                let runner = self.services.transactions.clone();
                let rules = self.design.rules.clone();
                let event_key = key.clone();
                effects.push(Effect::perform(
                    async move { generate_control_value(runner.as_ref(), &rules, &key).await },
                    move |result| FormEvent::ControlValueResolved {
                        column_key: event_key,
                        generation,
                        result,
                    },
                ));
            }
        }

        for (key, config) in option_plans {
            let entry = self.state.choices.entry(key.clone()).or_default();
            if entry.fetched || entry.loading {
                continue;
            }
            entry.loading = true;
            let params = generate_params(&config.col_filter, &self.state.values);
            let source = self.services.options.clone();
            let language = self.language.clone();
            let event_key = key.clone();
            effects.push(Effect::perform(
                async move { source.fetch_options(&config, &language, &params).await },
                move |result| FormEvent::OptionsLoaded {
                    column_key: event_key,
                    generation,
                    result,
                },
            ));
        }

        Effect::batch(effects)
    }

    /// Apply one event. Pure state transition in, effect out.
    pub fn update(&mut self, event: FormEvent) -> Effect<FormEvent> {
        match event {
            FormEvent::ValueEdited { column_key, value } => {
                self.state.field_errors.remove(&column_key);
                if !self
                    .state
                    .values
                    .apply(&column_key, value.clone(), ValueSource::User)
                {
                    return Effect::None;
                }
                // A controller edit resets the components it manages.
                let managed: Vec<String> = self
                    .design
                    .rules
                    .managed_components(&column_key)
                    .iter()
                    .map(|key| key.to_string())
                    .collect();
                for key in &managed {
                    self.state.values.remove(key);
                    self.state.field_errors.remove(key);
                }
                Effect::signal(FormSignal::ValueChanged { column_key, value })
            }

            FormEvent::TabSelected { layout_id, index } => {
                self.state.active_tabs.insert(layout_id, index);
                Effect::None
            }

            FormEvent::SearchEdited { text } => {
                self.state.search_text = text;
                Effect::None
            }

            FormEvent::SearchSubmitted => self.queue_search(0),
            FormEvent::PageRequested { index } => self.queue_search(index),

            FormEvent::SearchLoaded { seq, result } => {
                if !self.state.is_current_search(seq) {
                    return Effect::None;
                }
                self.state.searching = false;
                match result {
                    Ok(page) => self.state.search_results = Some(page),
                    Err(err) => log::warn!("search failed: {err:#}"),
                }
                Effect::None
            }

            FormEvent::OptionsLoaded { column_key, generation, result } => {
                if !self.state.is_current(generation) {
                    return Effect::None;
                }
                let Some(config) = self
                    .design
                    .input_by_key(&column_key)
                    .map(|input| input.config.clone())
                else {
                    return Effect::None;
                };
                let entry = self.state.choices.entry(column_key.clone()).or_default();
                entry.loading = false;
                entry.fetched = true;
                match result {
                    Ok(items) => entry.choices = options::map_choices(&config, &items),
                    Err(err) => log::warn!("options for {column_key:?} failed: {err:#}"),
                }
                Effect::None
            }

            FormEvent::ControlValueResolved { column_key, generation, result } => {
                if !self.state.is_current(generation) {
                    return Effect::None;
                }
                self.state.control_value_fetched = true;
                match result {
                    Ok(Some(value)) => {
                        self.state
                            .values
                            .apply(&column_key, value, ValueSource::Control);
                        Effect::None
                    }
                    Ok(None) => Effect::None,
                    Err(err) => match err.downcast_ref::<EngineError>() {
                        Some(engine_err) if engine_err.is_user_facing() => {
                            Effect::signal(FormSignal::Alert(engine_err.to_string()))
                        }
                        _ => {
                            log::warn!("control value for {column_key:?} failed: {err:#}");
                            Effect::None
                        }
                    },
                }
            }

            FormEvent::ButtonClicked { code } => {
                let toggles = check_rules(&self.design.rules, &code, self.state.mode);
                for toggle in toggles {
                    self.state.button_disabled.insert(toggle.button, toggle.disabled);
                }
                Effect::None
            }

            FormEvent::RowActivated { index } => {
                let Some(row) = self
                    .state
                    .search_results
                    .as_ref()
                    .and_then(|page| page.row(index))
                    .cloned()
                else {
                    return Effect::None;
                };
                let action = self
                    .design
                    .inputs()
                    .find(|input| input.input_type == InputType::TableSearch)
                    .and_then(|input| input.config.row_select.clone());
                match action {
                    Some(action) => self.apply_row_action(action, row),
                    None => Effect::None,
                }
            }

            FormEvent::DetailFetched { txcode, generation, result } => {
                if !self.state.is_current(generation) {
                    return Effect::None;
                }
                match result {
                    Ok(response) => match response.first_record() {
                        Some(record) => {
                            self.load_record(&record);
                            Effect::None
                        }
                        None => Effect::signal(FormSignal::Alert(
                            EngineError::EmptyTxResult { txcode, field: "detail".into() }
                                .to_string(),
                        )),
                    },
                    Err(err) => {
                        log::warn!("row detail fetch failed: {err:#}");
                        Effect::None
                    }
                }
            }

            FormEvent::RecordLoaded { record } => {
                self.load_record(&record);
                Effect::None
            }

            FormEvent::TableRowAdded { column_key, key } => {
                self.state
                    .tables
                    .entry(column_key.clone())
                    .or_default()
                    .add_row(key, Map::new());
                self.sync_table(column_key)
            }

            FormEvent::TableRowDeleted { column_key, index } => {
                let changed = self
                    .state
                    .tables
                    .get_mut(&column_key)
                    .is_some_and(|set| set.soft_delete(index));
                if changed { self.sync_table(column_key) } else { Effect::None }
            }

            FormEvent::TableRowRenamed { column_key, index, key } => {
                let changed = self
                    .state
                    .tables
                    .get_mut(&column_key)
                    .is_some_and(|set| set.rename_key(index, key));
                if changed { self.sync_table(column_key) } else { Effect::None }
            }

            FormEvent::TableCellEdited { column_key, index, cell, value } => {
                let changed = self
                    .state
                    .tables
                    .get_mut(&column_key)
                    .is_some_and(|set| set.set_cell(index, &cell, value));
                if changed { self.sync_table(column_key) } else { Effect::None }
            }

            FormEvent::FileChosen { column_key, file_name, bytes } => {
                self.queue_upload(column_key, file_name, bytes)
            }

            FormEvent::FileUploaded { column_key, generation, result } => {
                if !self.state.is_current(generation) {
                    return Effect::None;
                }
                match result {
                    Ok(outcome) => {
                        self.state.uploads.insert(
                            column_key.clone(),
                            UploadState::Stored { file_url: outcome.file_url.clone() },
                        );
                        let value = json!(outcome.file_url);
                        self.state
                            .values
                            .apply(&column_key, value.clone(), ValueSource::User);
                        Effect::signal(FormSignal::ValueChanged { column_key, value })
                    }
                    Err(err) => {
                        self.state.uploads.insert(column_key.clone(), UploadState::Empty);
                        match err.downcast_ref::<EngineError>() {
                            Some(conflict @ EngineError::FileAlreadyUsed(_)) => {
                                // Domain conflict: shown inline on the
                                // field, not as a blocking alert.
                                self.state
                                    .field_errors
                                    .insert(column_key, conflict.to_string());
                            }
                            _ => log::warn!("upload for {column_key:?} failed: {err:#}"),
                        }
                        Effect::None
                    }
                }
            }

            FormEvent::FileRemoved { column_key } => {
                self.state.uploads.insert(column_key.clone(), UploadState::Empty);
                let removed = self
                    .state
                    .values
                    .remove(&column_key)
                    .and_then(|value| value.as_str().map(str::to_string));
                let empty = Value::String(String::new());
                self.state
                    .values
                    .apply(&column_key, empty.clone(), ValueSource::User);
                let remote = match removed {
                    Some(url) if !url.is_empty() => {
                        let files = self.services.files.clone();
                        Effect::perform(
                            async move { files.remove(&url).await },
                            |result| FormEvent::FileRemoveFinished { result },
                        )
                    }
                    _ => Effect::None,
                };
                Effect::batch(vec![
                    remote,
                    Effect::signal(FormSignal::ValueChanged { column_key, value: empty }),
                ])
            }

            FormEvent::FileRemoveFinished { result } => {
                if let Err(err) = result {
                    log::warn!("remote file removal failed: {err:#}");
                }
                Effect::None
            }

            FormEvent::LookupOpened { column_key } => {
                if self.depth + 1 > MAX_SUBFORM_DEPTH {
                    return Effect::signal(FormSignal::Alert(
                        EngineError::SubFormDepthExceeded { max: MAX_SUBFORM_DEPTH }.to_string(),
                    ));
                }
                let Some(target) = self
                    .design
                    .input_by_key(&column_key)
                    .and_then(|input| input.config.call_form.clone())
                else {
                    log::warn!("lookup on {column_key:?} has no target form");
                    return Effect::None;
                };
                let forms = self.services.forms.clone();
                let language = self.language.clone();
                let generation = self.state.generation();
                let kind = SubFormKind::Lookup { for_key: column_key };
                Effect::perform(
                    async move { forms.load_form(&language, &target).await },
                    move |result| FormEvent::SubFormLoaded { generation, kind, result },
                )
            }

            FormEvent::SameMainOpened => {
                if self.depth + 1 > MAX_SUBFORM_DEPTH {
                    return Effect::signal(FormSignal::Alert(
                        EngineError::SubFormDepthExceeded { max: MAX_SUBFORM_DEPTH }.to_string(),
                    ));
                }
                self.mount_sub(SubFormKind::SameMain, self.design.clone())
            }

            FormEvent::AdvancedToggled => {
                if self.state.advanced_open {
                    self.state.advanced_open = false;
                    if matches!(
                        self.sub.as_deref(),
                        Some(SubFormSession { kind: SubFormKind::AdvancedSearch, .. })
                    ) {
                        self.sub = None;
                    }
                    return Effect::None;
                }
                if self.depth + 1 > MAX_SUBFORM_DEPTH {
                    return Effect::signal(FormSignal::Alert(
                        EngineError::SubFormDepthExceeded { max: MAX_SUBFORM_DEPTH }.to_string(),
                    ));
                }
                self.state.advanced_open = true;
                self.mount_sub(SubFormKind::AdvancedSearch, self.design.clone())
            }

            FormEvent::SubFormLoaded { generation, kind, result } => {
                if !self.state.is_current(generation) {
                    return Effect::None;
                }
                match result {
                    Ok(design) => self.mount_sub(kind, design),
                    Err(err) => {
                        log::warn!("loading sub-form failed: {err:#}");
                        Effect::None
                    }
                }
            }

            FormEvent::SubFormClosed => {
                if let Some(sub) = self.sub.take() {
                    if sub.kind == SubFormKind::AdvancedSearch {
                        self.state.advanced_open = false;
                    }
                }
                Effect::None
            }

            FormEvent::Sub(inner) => self.update_sub(*inner),

            FormEvent::SubmitRequested => self.submit(),
        }
    }

    /// Compose the current tree, sub-form overlay included.
    pub fn render(&self) -> FormTree {
        let mut tree = compose(&ComposeCtx {
            design: &self.design,
            state: &self.state,
            registry: dispatch::registry(),
            roles: self.services.roles.as_ref(),
            language: &self.language,
        });
        if let Some(sub) = &self.sub {
            tree.overlay = Some(Box::new(OverlayNode {
                title: sub.kind.title(),
                tree: sub.session.render(),
            }));
        }
        tree
    }

    /// Run bootstrap to quiescence. Convenience for hosts without their own
    /// effect loop.
    pub async fn start(&mut self) -> Vec<FormSignal> {
        let effect = self.bootstrap();
        self.run_effect(effect).await
    }

    /// Apply an event and execute everything it causes, returning the
    /// signals produced along the way.
    pub async fn drive(&mut self, event: FormEvent) -> Vec<FormSignal> {
        let effect = self.update(event);
        self.run_effect(effect).await
    }

    async fn run_effect(&mut self, effect: Effect<FormEvent>) -> Vec<FormSignal> {
        let mut signals = Vec::new();
        let mut pending = VecDeque::from([effect]);
        while let Some(effect) = pending.pop_front() {
            for leaf in effect.into_leaves() {
                match leaf {
                    Effect::Perform(future) => {
                        let next = future.await;
                        pending.push_back(self.update(next));
                    }
                    Effect::Signal(signal) => signals.push(signal),
                    Effect::None | Effect::Batch(_) => {}
                }
            }
        }
        signals
    }

    fn queue_search(&mut self, page_index: u64) -> Effect<FormEvent> {
        let Some((subject, tx)) = self
            .design
            .inputs()
            .find(|input| input.input_type == InputType::TableSearch)
            .map(|input| {
                let key = input.column_key();
                let subject =
                    if key.is_empty() { "search".to_string() } else { key.to_string() };
                (subject, input.config.tx.clone())
            })
        else {
            return Effect::None;
        };
        let Some(tx) = tx else {
            return Effect::None;
        };
        let descriptor = match tx.descriptors(&subject) {
            Ok(descriptors) => match descriptors.first() {
                Some(descriptor) => descriptor.clone(),
                None => return Effect::None,
            },
            Err(err) => return Effect::signal(FormSignal::Alert(err.to_string())),
        };

        let seq = self.state.bump_search();
        self.state.searching = true;
        let mut params = Map::new();
        params.insert("searchtext".into(), json!(self.state.search_text));
        params.insert("pageindex".into(), json!(page_index));
        params.insert("pagesize".into(), json!(DEFAULT_PAGE_SIZE));
        let request = TxRequest::from_descriptor(&descriptor, params);
        let runner = self.services.transactions.clone();
        Effect::perform(
            async move {
                let response = runner.run_fo_dynamic(request).await?;
                Ok(response.page().unwrap_or_default())
            },
            move |result| FormEvent::SearchLoaded { seq, result },
        )
    }

    fn apply_row_action(&mut self, action: RowAction, row: Value) -> Effect<FormEvent> {
        match action {
            RowAction::CopyRecord { prefix } => {
                if let Value::Object(record) = row {
                    for (key, value) in record {
                        let target = match &prefix {
                            Some(prefix) => match key.strip_prefix(prefix.as_str()) {
                                Some(stripped) => stripped.to_string(),
                                None => continue,
                            },
                            None => key,
                        };
                        self.state.values.apply(&target, value, ValueSource::Record);
                    }
                }
                Effect::None
            }
            RowAction::OpenDetail { url_template } => Effect::signal(FormSignal::OpenUrl(
                row_action::expand_url_template(&url_template, &row),
            )),
            RowAction::DesignForm { form_id } => {
                Effect::signal(FormSignal::NavigateForm(form_id))
            }
            RowAction::FetchDetail { tx } => {
                let Some(tx) = tx else {
                    return Effect::None;
                };
                let descriptor = match tx.descriptors("row-select") {
                    Ok(descriptors) => match descriptors.first() {
                        Some(descriptor) => descriptor.clone(),
                        None => return Effect::None,
                    },
                    Err(err) => return Effect::signal(FormSignal::Alert(err.to_string())),
                };
                let params = row.as_object().cloned().unwrap_or_default();
                let txcode = descriptor.code.as_tag().to_string();
                let request = TxRequest::from_descriptor(&descriptor, params);
                let runner = self.services.transactions.clone();
                let generation = self.state.generation();
                Effect::perform(
                    async move { runner.run_fo_dynamic(request).await },
                    move |result| FormEvent::DetailFetched { txcode, generation, result },
                )
            }
        }
    }

    fn load_record(&mut self, record: &Map<String, Value>) {
        self.state.values.apply_record(record);
        let table_plans: Vec<(String, Vec<String>)> = self
            .design
            .inputs()
            .filter(|input| input.input_type == InputType::TableDynamic)
            .map(|input| (input.column_key().to_string(), input.config.default_keys.clone()))
            .collect();
        for (key, mains) in table_plans {
            if let Some(Value::Array(rows)) = record.get(&key) {
                let set = RowSet::from_schema(&mains, rows);
                self.state.values.apply(&key, set.to_value(), ValueSource::Record);
                self.state.tables.insert(key, set);
            }
        }
    }

    fn sync_table(&mut self, column_key: String) -> Effect<FormEvent> {
        let Some(set) = self.state.tables.get(&column_key) else {
            return Effect::None;
        };
        let value = set.to_value();
        self.state
            .values
            .apply(&column_key, value.clone(), ValueSource::User);
        Effect::signal(FormSignal::ValueChanged { column_key, value })
    }

    fn queue_upload(
        &mut self,
        column_key: String,
        file_name: String,
        bytes: Vec<u8>,
    ) -> Effect<FormEvent> {
        let Some(config) = self
            .design
            .input_by_key(&column_key)
            .map(|input| input.config.clone())
        else {
            return Effect::None;
        };
        if !config.accept.is_empty() {
            let ext = file_name
                .rsplit('.')
                .next()
                .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
                .unwrap_or_default();
            if !config.accept.contains(&ext) {
                self.state
                    .field_errors
                    .insert(column_key, format!("file type {ext:?} is not accepted"));
                return Effect::None;
            }
        }
        if let Some(max) = config.max_size_mb {
            if bytes.len() as u64 > max.saturating_mul(1024 * 1024) {
                self.state
                    .field_errors
                    .insert(column_key, format!("file exceeds the {max} MB limit"));
                return Effect::None;
            }
        }
        self.state.field_errors.remove(&column_key);
        self.state.uploads.insert(
            column_key.clone(),
            UploadState::Uploading { file_name: file_name.clone() },
        );
        let files = self.services.files.clone();
        let folder = config.folder.clone().unwrap_or_default();
        let generation = self.state.generation();
        Effect::perform(
            async move { files.upload(&folder, &file_name, bytes).await },
            move |result| FormEvent::FileUploaded { column_key, generation, result },
        )
    }

    fn mount_sub(&mut self, kind: SubFormKind, design: FormDesign) -> Effect<FormEvent> {
        let mut session = FormSession {
            design,
            state: SessionState::new(FormMode::View),
            services: self.services.clone(),
            language: self.language.clone(),
            depth: self.depth + 1,
            sub: None,
        };
        let mut effects = vec![map_sub(session.bootstrap())];
        if kind.is_lookup() {
            // Lookups open onto a pre-executed search.
            effects.push(map_sub(session.update(FormEvent::SearchSubmitted)));
        }
        self.sub = Some(Box::new(SubFormSession { kind, session }));
        Effect::batch(effects)
    }

    fn update_sub(&mut self, event: FormEvent) -> Effect<FormEvent> {
        // Picking a row in a lookup writes back to the parent field instead
        // of running the sub-form's own row action.
        if let FormEvent::RowActivated { index } = &event {
            if let Some(sub) = self.sub.as_deref() {
                if let SubFormKind::Lookup { for_key } = &sub.kind {
                    let for_key = for_key.clone();
                    let row = sub
                        .session
                        .state()
                        .search_results
                        .as_ref()
                        .and_then(|page| page.row(*index))
                        .cloned();
                    return self.finish_lookup(&for_key, row);
                }
            }
        }
        match self.sub.as_mut() {
            Some(sub) => map_sub(sub.session.update(event)),
            None => {
                log::debug!("dropping sub-form event, no sub-form mounted");
                Effect::None
            }
        }
    }

    fn finish_lookup(&mut self, for_key: &str, row: Option<Value>) -> Effect<FormEvent> {
        self.sub = None;
        let Some(row) = row else {
            return Effect::None;
        };
        let picked = self.design.input_by_key(for_key).and_then(|input| {
            input
                .config
                .key_selected
                .as_deref()
                .or(input.config.key_display.as_deref())
                .and_then(|key| row.get(key))
                .cloned()
        });
        match picked {
            Some(value) => {
                self.state
                    .values
                    .apply(for_key, value.clone(), ValueSource::User);
                Effect::signal(FormSignal::ValueChanged {
                    column_key: for_key.to_string(),
                    value,
                })
            }
            None => {
                log::warn!("lookup row carries no value for {for_key:?}");
                Effect::None
            }
        }
    }

    fn submit(&mut self) -> Effect<FormEvent> {
        let failures = self.validate();
        if !failures.is_empty() {
            let summary: Vec<String> =
                failures.iter().map(|(_, message)| message.clone()).collect();
            for (key, message) in failures {
                self.state.field_errors.insert(key, message);
            }
            return Effect::signal(FormSignal::Alert(format!(
                "Validation failed: {}",
                summary.join("; ")
            )));
        }
        let table_values: Vec<(String, Value)> = self
            .state
            .tables
            .iter()
            .map(|(key, set)| (key.clone(), set.to_value()))
            .collect();
        for (key, value) in table_values {
            self.state.values.apply(&key, value, ValueSource::User);
        }
        Effect::signal(FormSignal::Submitted { payload: self.state.values.snapshot() })
    }

    fn validate(&self) -> Vec<(String, String)> {
        let hidden = hidden_fields(&self.design.rules);
        let mut failures = Vec::new();
        for input in self.design.inputs() {
            if !input.input_type.binds_value() {
                continue;
            }
            let key = input.column_key();
            if key.is_empty() || hidden.contains(key) {
                continue;
            }
            let text = self.state.value_text(key);
            let empty = match input.input_type {
                InputType::TableDynamic => self
                    .state
                    .table(key)
                    .map(|set| set.visible_len() == 0)
                    .unwrap_or(true),
                // An unchecked checkbox is a value, not a gap.
                InputType::CheckBox => false,
                _ => text.trim().is_empty(),
            };
            if is_field_required(input) && empty {
                failures.push((
                    key.to_string(),
                    format!("{} is required", input.label(&self.language)),
                ));
                continue;
            }
            if text.is_empty() {
                continue;
            }
            let (min, max) = (input.validate.min, input.validate.max);
            if (min.is_some() || max.is_some())
                && let Ok(number) = text.parse::<f64>()
                && (min.is_some_and(|m| number < m) || max.is_some_and(|m| number > m))
            {
                failures.push((
                    key.to_string(),
                    format!("{} is out of range", input.label(&self.language)),
                ));
            }
        }
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::traits::{
        FileStore, FormDesignService, OptionSource, RoleAuthority, TransactionRunner,
    };
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;

    struct StubForms;

    #[async_trait]
    impl FormDesignService for StubForms {
        async fn load_form(&self, _: &str, _: &str) -> anyhow::Result<FormDesign> {
            anyhow::bail!("no form designs in this test")
        }
    }

    struct StubRunner;

    #[async_trait]
    impl TransactionRunner for StubRunner {
        async fn run_fo(&self, _: TxRequest) -> anyhow::Result<TxResponse> {
            anyhow::bail!("no transactions in this test")
        }
        async fn run_fo_dynamic(&self, _: TxRequest) -> anyhow::Result<TxResponse> {
            anyhow::bail!("no transactions in this test")
        }
        async fn run_bo_dynamic(&self, _: TxRequest) -> anyhow::Result<TxResponse> {
            anyhow::bail!("no transactions in this test")
        }
    }

    struct StubOptions;

    #[async_trait]
    impl OptionSource for StubOptions {
        async fn fetch_options(
            &self,
            _: &crate::schema::InputConfig,
            _: &str,
            _: &Map<String, Value>,
        ) -> anyhow::Result<Vec<Value>> {
            Ok(Vec::new())
        }
    }

    struct StubFiles;

    #[async_trait]
    impl FileStore for StubFiles {
        async fn upload(&self, _: &str, _: &str, _: Vec<u8>) -> anyhow::Result<UploadOutcome> {
            anyhow::bail!("no uploads in this test")
        }
        async fn remove(&self, _: &str) -> anyhow::Result<()> {
            Ok(())
        }
    }

    struct StubRoles;

    impl RoleAuthority for StubRoles {
        fn role_ids(&self) -> Vec<String> {
            Vec::new()
        }
        fn install_flags(
            &self,
            _: &str,
            _: &str,
        ) -> Option<crate::services::models::InstallFlags> {
            None
        }
    }

    fn stub_services() -> Services {
        Services {
            forms: Arc::new(StubForms),
            transactions: Arc::new(StubRunner),
            options: Arc::new(StubOptions),
            files: Arc::new(StubFiles),
            roles: Arc::new(StubRoles),
        }
    }

    fn design(inputs: Value, rules: Value) -> FormDesign {
        FormDesign::from_value(json!({
            "form_design_detail": {
                "form_id": "frm_credential",
                "info": { "ruleStrong": rules },
                "list_layout": [{
                    "id": "lay_main",
                    "list_view": [{
                        "id": "v_general",
                        "name": "General",
                        "list_input": inputs
                    }]
                }]
            }
        }))
        .unwrap()
    }

    fn session(design: FormDesign, mode: FormMode) -> FormSession {
        FormSession::new(design, stub_services(), "en", mode)
    }

    fn signals(effect: Effect<FormEvent>) -> Vec<FormSignal> {
        effect
            .into_leaves()
            .into_iter()
            .filter_map(|leaf| match leaf {
                Effect::Signal(signal) => Some(signal),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn edit_emits_value_changed_and_clears_error() {
        let mut session = session(
            design(
                json!([{
                    "inputtype": "cTextInput",
                    "config": { "structable_read": "credential.ci_name" }
                }]),
                json!([]),
            ),
            FormMode::Add,
        );
        session
            .state
            .field_errors
            .insert("ci_name".into(), "old error".into());

        let out = signals(session.update(FormEvent::ValueEdited {
            column_key: "ci_name".into(),
            value: json!("edge-cert"),
        }));
        assert_eq!(
            out,
            vec![FormSignal::ValueChanged {
                column_key: "ci_name".into(),
                value: json!("edge-cert"),
            }]
        );
        assert_eq!(session.state.value_text("ci_name"), "edge-cert");
        assert!(!session.state.field_errors.contains_key("ci_name"));

        // Re-applying the identical value is not a change.
        let repeat = session.update(FormEvent::ValueEdited {
            column_key: "ci_name".into(),
            value: json!("edge-cert"),
        });
        assert!(repeat.is_none());
    }

    #[test]
    fn controller_edit_resets_managed_components() {
        let mut session = session(
            design(
                json!([
                    { "inputtype": "jSelect", "config": { "structable_read": "t.ci_type" } },
                    { "inputtype": "jSelect", "config": { "structable_read": "t.ci_algo" } }
                ]),
                json!([{
                    "code": "managerComponent",
                    "config": { "component_manager": { "ci_type": "ci_algo" } }
                }]),
            ),
            FormMode::Add,
        );
        session
            .state
            .values
            .apply("ci_algo", json!("RSA"), ValueSource::User);

        session.update(FormEvent::ValueEdited {
            column_key: "ci_type".into(),
            value: json!("TLS"),
        });
        assert!(session.state.values.get("ci_algo").is_none());
    }

    #[test]
    fn copy_record_action_strips_prefix() {
        let mut session = session(json_design_with_text(), FormMode::Add);
        session.apply_row_action(
            RowAction::CopyRecord { prefix: Some("t_".into()) },
            json!({ "t_ci_name": "edge-cert", "unrelated": "dropped" }),
        );
        assert_eq!(session.state.value_text("ci_name"), "edge-cert");
        assert!(session.state.values.get("unrelated").is_none());
        assert!(session.state.values.get("t_ci_name").is_none());
    }

    fn json_design_with_text() -> FormDesign {
        design(
            json!([{
                "inputtype": "cTextInput",
                "config": { "structable_read": "credential.ci_name" }
            }]),
            json!([]),
        )
    }

    #[test]
    fn table_edits_keep_bound_value_in_sync() {
        let mut session = session(
            design(
                json!([{
                    "inputtype": "cTableDynamic",
                    "config": {
                        "structable_read": "credential.ci_rows",
                        "defaultkey": "host"
                    }
                }]),
                json!([]),
            ),
            FormMode::Add,
        );
        session.bootstrap();

        session.update(FormEvent::TableRowAdded {
            column_key: "ci_rows".into(),
            key: "port".into(),
        });
        session.update(FormEvent::TableCellEdited {
            column_key: "ci_rows".into(),
            index: 1,
            cell: "value".into(),
            value: json!("8443"),
        });
        let bound = session.state.values.get("ci_rows").unwrap();
        let rows = bound.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["configKey"], "port");
        assert_eq!(rows[1]["value"], "8443");

        // Deleting the injected main key is refused, deleting the added
        // row marks it without dropping it from the bound value.
        let refused = session.update(FormEvent::TableRowDeleted {
            column_key: "ci_rows".into(),
            index: 0,
        });
        assert!(refused.is_none());
        session.update(FormEvent::TableRowDeleted { column_key: "ci_rows".into(), index: 1 });
        let bound = session.state.values.get("ci_rows").unwrap();
        assert_eq!(bound.as_array().unwrap().len(), 2);
        assert_eq!(bound.as_array().unwrap()[1]["isdeleted"], true);
    }

    #[test]
    fn stale_async_results_are_dropped() {
        let mut session = session(
            design(
                json!([{
                    "inputtype": "jSelect",
                    "config": { "structable_read": "t.ci_type" }
                }]),
                json!([]),
            ),
            FormMode::Add,
        );
        let old_generation = session.state.generation();
        session.state.bump_generation();

        session.update(FormEvent::OptionsLoaded {
            column_key: "ci_type".into(),
            generation: old_generation,
            result: Ok(vec![json!({"value": "TLS", "label": "TLS cert"})]),
        });
        assert!(session.state.choice_state("ci_type").is_none());

        session.update(FormEvent::ControlValueResolved {
            column_key: "ci_type".into(),
            generation: old_generation,
            result: Ok(Some(json!("SN-1"))),
        });
        assert!(session.state.values.get("ci_type").is_none());
        assert!(!session.state.control_value_fetched);
    }

    #[test]
    fn upload_conflict_lands_inline_not_as_an_alert() {
        let mut session = session(
            design(
                json!([{
                    "inputtype": "cImage",
                    "config": { "structable_read": "credential.ci_logo", "store": "cdn" }
                }]),
                json!([]),
            ),
            FormMode::Add,
        );
        let generation = session.state.generation();

        let out = signals(session.update(FormEvent::FileUploaded {
            column_key: "ci_logo".into(),
            generation,
            result: Err(EngineError::FileAlreadyUsed("seal.png".into()).into()),
        }));
        assert!(out.is_empty());
        assert_eq!(
            session.state.uploads.get("ci_logo"),
            Some(&UploadState::Empty)
        );
        let error = session.state.field_errors.get("ci_logo").unwrap();
        assert!(error.contains("seal.png"), "unexpected error text: {error}");

        // Any other store failure only logs.
        session.state.field_errors.clear();
        session.update(FormEvent::FileUploaded {
            column_key: "ci_logo".into(),
            generation,
            result: Err(anyhow::anyhow!("cdn unreachable")),
        });
        assert!(session.state.field_errors.is_empty());
        assert_eq!(
            session.state.uploads.get("ci_logo"),
            Some(&UploadState::Empty)
        );
    }

    #[test]
    fn lookup_pick_fills_parent_and_closes() {
        let mut parent = session(
            design(
                json!([{
                    "inputtype": "cTextInputFunc",
                    "config": {
                        "structable_read": "credential.ci_owner",
                        "callform": "frm_user_lookup",
                        "key_selected": "usr_id",
                        "key_display": "usr_name"
                    }
                }]),
                json!([]),
            ),
            FormMode::Add,
        );
        let mut sub = session(design(json!([]), json!([])), FormMode::View);
        sub.state.search_results = Some(
            PageData::from_json(json!([{ "usr_id": "u7", "usr_name": "Ana" }])).unwrap(),
        );
        parent.sub = Some(Box::new(SubFormSession {
            kind: SubFormKind::Lookup { for_key: "ci_owner".into() },
            session: sub,
        }));

        let out = signals(
            parent.update(FormEvent::Sub(Box::new(FormEvent::RowActivated { index: 0 }))),
        );
        assert_eq!(
            out,
            vec![FormSignal::ValueChanged {
                column_key: "ci_owner".into(),
                value: json!("u7"),
            }]
        );
        assert!(parent.sub.is_none());
        assert_eq!(parent.state.value_text("ci_owner"), "u7");
    }

    #[test]
    fn submit_blocks_on_required_and_range() {
        let mut session = session(
            design(
                json!([
                    {
                        "inputtype": "cTextInput",
                        "default": { "name": "Name", "condition": "required" },
                        "config": { "structable_read": "t.ci_name" }
                    },
                    {
                        "inputtype": "jCurrency",
                        "default": { "name": "Fee" },
                        "config": { "structable_read": "t.ci_fee" },
                        "validate": { "min": "1", "max": "100" }
                    }
                ]),
                json!([]),
            ),
            FormMode::Add,
        );
        session
            .state
            .values
            .apply("ci_fee", json!("250"), ValueSource::User);

        let out = signals(session.update(FormEvent::SubmitRequested));
        assert_eq!(out.len(), 1);
        match &out[0] {
            FormSignal::Alert(message) => {
                assert!(message.contains("Name is required"));
                assert!(message.contains("Fee is out of range"));
            }
            other => panic!("expected Alert, got {other:?}"),
        }
        assert!(session.state.field_errors.contains_key("ci_name"));
        assert!(session.state.field_errors.contains_key("ci_fee"));

        session.update(FormEvent::ValueEdited {
            column_key: "ci_name".into(),
            value: json!("edge-cert"),
        });
        session.update(FormEvent::ValueEdited {
            column_key: "ci_fee".into(),
            value: json!("50"),
        });
        let out = signals(session.update(FormEvent::SubmitRequested));
        match &out[0] {
            FormSignal::Submitted { payload } => {
                assert_eq!(payload["ci_name"], "edge-cert");
                assert_eq!(payload["ci_fee"], "50");
            }
            other => panic!("expected Submitted, got {other:?}"),
        }
    }

    #[test]
    fn hidden_fields_skip_validation() {
        let mut session = session(
            design(
                json!([{
                    "inputtype": "cTextInput",
                    "default": { "name": "Secret", "condition": "required" },
                    "config": { "structable_read": "t.ci_secret" }
                }]),
                json!([{
                    "code": "visibility",
                    "config": {
                        "component_event": "on_change",
                        "component_result": "ci_secret",
                        "visible": "false"
                    }
                }]),
            ),
            FormMode::Add,
        );
        let out = signals(session.update(FormEvent::SubmitRequested));
        assert!(matches!(&out[0], FormSignal::Submitted { .. }));
    }

    #[test]
    fn nested_form_depth_is_bounded() {
        let mut session = session(
            design(
                json!([{
                    "inputtype": "cTextInputFunc",
                    "config": {
                        "structable_read": "t.ci_owner",
                        "callform": "frm_user_lookup"
                    }
                }]),
                json!([]),
            ),
            FormMode::Add,
        );
        session.depth = MAX_SUBFORM_DEPTH;

        let out = signals(session.update(FormEvent::LookupOpened {
            column_key: "ci_owner".into(),
        }));
        assert_eq!(out.len(), 1);
        assert!(matches!(&out[0], FormSignal::Alert(_)));
        assert!(session.sub.is_none());
    }

    #[tokio::test]
    async fn bootstrap_seeds_defaults_and_injects_main_keys() {
        let mut session = session(
            design(
                json!([
                    {
                        "inputtype": "cTextInput",
                        "config": {
                            "structable_read": "t.ci_status",
                            "data_default": "ACTIVE"
                        }
                    },
                    {
                        "inputtype": "cTableDynamic",
                        "config": {
                            "structable_read": "t.ci_rows",
                            "defaultkey": "host;port"
                        }
                    }
                ]),
                json!([]),
            ),
            FormMode::Add,
        );
        let signals = session.start().await;
        assert!(signals.is_empty());
        assert_eq!(session.state.value_text("ci_status"), "ACTIVE");
        assert_eq!(
            session.state.values.source("ci_status"),
            Some(ValueSource::Default)
        );
        let table = session.state.table("ci_rows").unwrap();
        assert_eq!(table.visible_len(), 2);
        assert!(table.rows().iter().all(|row| row.is_main_key));

        // A user edit then outranks the seeded default.
        session.update(FormEvent::ValueEdited {
            column_key: "ci_status".into(),
            value: json!("REVOKED"),
        });
        assert_eq!(session.state.value_text("ci_status"), "REVOKED");
    }
}
