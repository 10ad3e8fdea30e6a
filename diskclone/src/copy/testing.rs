//! In-memory disk and clock used by the copy tests.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use super::deadline::Clock;
use crate::remote::{
    LinkedForm, RemoteError, RemoteFile, RemoteFolder, RemoteStorage, Sheet, SpreadsheetForms,
};

pub(crate) const XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

pub(crate) struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub(crate) fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub(crate) fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap()
    }
}

#[derive(Debug, Clone)]
struct Item {
    id: String,
    name: String,
    parent: Option<String>,
    folder: bool,
    mime: Option<String>,
    copied_from: Option<String>,
    /// Form id linked from each sheet, spreadsheets only.
    sheets: Vec<Option<String>>,
}

#[derive(Debug, Clone)]
struct Form {
    id: String,
    url: String,
    spreadsheet: Option<String>,
    trashed: bool,
}

#[derive(Default)]
struct DiskState {
    next_id: u64,
    items: Vec<Item>,
    forms: Vec<Form>,
    mutations: usize,
    fail_next: u32,
    fail_after: Option<(usize, u32)>,
}

impl DiskState {
    fn allocate(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn item(&self, id: &str) -> Result<&Item, RemoteError> {
        self.items
            .iter()
            .find(|item| item.id == id)
            .ok_or_else(|| RemoteError::OperationFailed(format!("{id} not found")))
    }

    fn children<'a>(&'a self, parent: &'a str) -> impl Iterator<Item = &'a Item> + 'a {
        self.items
            .iter()
            .filter(move |item| item.parent.as_deref() == Some(parent))
    }

    fn insert(&mut self, item: Item) -> String {
        let id = item.id.clone();
        self.items.push(item);
        id
    }
}

/// A storage service, spreadsheet service and form service in one.
///
/// Every remote mutation is counted and, when a clock is attached, advances
/// it by `tick` so deadlines expire after a known number of mutations.
pub(crate) struct MemoryDisk {
    state: Mutex<DiskState>,
    clock: Option<Arc<ManualClock>>,
    tick: Duration,
}

impl MemoryDisk {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(DiskState::default()),
            clock: None,
            tick: Duration::ZERO,
        }
    }

    pub(crate) fn with_clock(clock: Arc<ManualClock>, tick: Duration) -> Self {
        Self {
            state: Mutex::new(DiskState::default()),
            clock: Some(clock),
            tick,
        }
    }

    pub(crate) fn add_folder(&self, parent: Option<&str>, name: &str) -> String {
        let mut state = self.state.lock().unwrap();
        let id = state.allocate("folder");
        state.insert(Item {
            id,
            name: name.to_string(),
            parent: parent.map(str::to_string),
            folder: true,
            mime: None,
            copied_from: None,
            sheets: Vec::new(),
        })
    }

    pub(crate) fn add_file(&self, parent: &str, name: &str, mime: Option<&str>) -> String {
        let mut state = self.state.lock().unwrap();
        let id = state.allocate("file");
        state.insert(Item {
            id,
            name: name.to_string(),
            parent: Some(parent.to_string()),
            folder: false,
            mime: mime.map(str::to_string),
            copied_from: None,
            sheets: Vec::new(),
        })
    }

    /// Adds a spreadsheet with one sheet per entry; `true` entries get a
    /// linked form.
    pub(crate) fn add_spreadsheet(&self, parent: &str, name: &str, linked: &[bool]) -> String {
        let mut state = self.state.lock().unwrap();
        let id = state.allocate("sheet");
        let mut sheets = Vec::new();
        for has_form in linked {
            if *has_form {
                let form_id = state.allocate("form");
                state.forms.push(Form {
                    url: format!("https://forms.example/{form_id}"),
                    id: form_id.clone(),
                    spreadsheet: Some(id.clone()),
                    trashed: false,
                });
                sheets.push(Some(form_id));
            } else {
                sheets.push(None);
            }
        }
        state.insert(Item {
            id,
            name: name.to_string(),
            parent: Some(parent.to_string()),
            folder: false,
            mime: Some(XLSX.to_string()),
            copied_from: None,
            sheets,
        })
    }

    pub(crate) fn remove(&self, id: &str) {
        let mut state = self.state.lock().unwrap();
        state.items.retain(|item| item.id != id);
    }

    /// The next `count` calls fail, whatever they are.
    pub(crate) fn fail_next(&self, count: u32) {
        self.state.lock().unwrap().fail_next = count;
    }

    /// Once `after` mutations have happened, the next `count` calls fail.
    pub(crate) fn fail_after_mutations(&self, after: usize, count: u32) {
        self.state.lock().unwrap().fail_after = Some((after, count));
    }

    pub(crate) fn mutations(&self) -> usize {
        self.state.lock().unwrap().mutations
    }

    pub(crate) fn child_names(&self, parent: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.children(parent).map(|item| item.name.clone()).collect()
    }

    pub(crate) fn copies_of(&self, source: &str) -> usize {
        let state = self.state.lock().unwrap();
        state
            .items
            .iter()
            .filter(|item| item.copied_from.as_deref() == Some(source))
            .count()
    }

    pub(crate) fn mime_of(&self, id: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state.item(id).ok().and_then(|item| item.mime.clone())
    }

    pub(crate) fn linked_forms_of(&self, spreadsheet: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .item(spreadsheet)
            .map(|item| item.sheets.iter().flatten().cloned().collect())
            .unwrap_or_default()
    }

    pub(crate) fn linked_form_count(&self, spreadsheet: &str) -> usize {
        self.linked_forms_of(spreadsheet).len()
    }

    pub(crate) fn trashed_forms(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .forms
            .iter()
            .filter(|form| form.trashed)
            .map(|form| form.id.clone())
            .collect()
    }

    /// Sorted relative paths below `root`; folders end with `/`.
    pub(crate) fn describe(&self, root: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        let mut out = Vec::new();
        let mut pending = vec![(root.to_string(), String::new())];
        while let Some((id, prefix)) = pending.pop() {
            for item in state.children(&id) {
                if item.folder {
                    out.push(format!("{prefix}{}/", item.name));
                    pending.push((item.id.clone(), format!("{prefix}{}/", item.name)));
                } else {
                    out.push(format!("{prefix}{}", item.name));
                }
            }
        }
        out.sort();
        out
    }

    fn begin(&self) -> Result<MutexGuard<'_, DiskState>, RemoteError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(RemoteError::OperationFailed("injected failure".into()));
        }
        let mutations = state.mutations;
        if let Some((after, remaining)) = state.fail_after.as_mut()
            && mutations >= *after
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(RemoteError::OperationFailed("injected failure".into()));
        }
        Ok(state)
    }

    fn mutated(&self, state: &mut DiskState) {
        state.mutations += 1;
        if let Some(clock) = &self.clock {
            clock.advance(self.tick);
        }
    }
}

impl RemoteStorage for MemoryDisk {
    async fn folder_name(&self, folder: &str) -> Result<String, RemoteError> {
        let state = self.begin()?;
        Ok(state.item(folder)?.name.clone())
    }

    async fn exists(&self, id: &str) -> Result<bool, RemoteError> {
        let state = self.begin()?;
        Ok(state.item(id).is_ok())
    }

    async fn find_child(&self, parent: &str, name: &str) -> Result<Option<String>, RemoteError> {
        let state = self.begin()?;
        Ok(state
            .children(parent)
            .find(|item| item.name == name)
            .map(|item| item.id.clone()))
    }

    async fn list_files(&self, folder: &str) -> Result<Vec<RemoteFile>, RemoteError> {
        let state = self.begin()?;
        state.item(folder)?;
        Ok(state
            .children(folder)
            .filter(|item| !item.folder)
            .map(|item| RemoteFile {
                id: item.id.clone(),
                name: item.name.clone(),
                mime_type: item.mime.clone(),
            })
            .collect())
    }

    async fn list_folders(&self, folder: &str) -> Result<Vec<RemoteFolder>, RemoteError> {
        let state = self.begin()?;
        state.item(folder)?;
        Ok(state
            .children(folder)
            .filter(|item| item.folder)
            .map(|item| RemoteFolder {
                id: item.id.clone(),
                name: item.name.clone(),
            })
            .collect())
    }

    async fn create_folder(&self, parent: &str, name: &str) -> Result<String, RemoteError> {
        let mut state = self.begin()?;
        state.item(parent)?;
        self.mutated(&mut state);
        if let Some(existing) = state
            .children(parent)
            .find(|item| item.folder && item.name == name)
        {
            return Ok(existing.id.clone());
        }
        let id = state.allocate("folder");
        Ok(state.insert(Item {
            id,
            name: name.to_string(),
            parent: Some(parent.to_string()),
            folder: true,
            mime: None,
            copied_from: None,
            sheets: Vec::new(),
        }))
    }

    async fn copy_file(
        &self,
        file: &str,
        dest_folder: &str,
        name: &str,
    ) -> Result<String, RemoteError> {
        let mut state = self.begin()?;
        state.item(dest_folder)?;
        let source = state.item(file)?.clone();
        self.mutated(&mut state);
        let id = state.allocate("file");

        // Duplicating a spreadsheet clones its forms and links the clones to
        // the copy.
        let mut sheets = Vec::new();
        for form_id in &source.sheets {
            match form_id {
                Some(_) => {
                    let clone_id = state.allocate("form");
                    state.forms.push(Form {
                        url: format!("https://forms.example/{clone_id}"),
                        id: clone_id.clone(),
                        spreadsheet: Some(id.clone()),
                        trashed: false,
                    });
                    sheets.push(Some(clone_id));
                }
                None => sheets.push(None),
            }
        }

        Ok(state.insert(Item {
            id,
            name: name.to_string(),
            parent: Some(dest_folder.to_string()),
            folder: false,
            mime: source.mime,
            copied_from: Some(source.id),
            sheets,
        }))
    }

    async fn create_converted(
        &self,
        file: &str,
        dest_folder: &str,
        name: &str,
        target_mime: &str,
    ) -> Result<String, RemoteError> {
        let mut state = self.begin()?;
        state.item(dest_folder)?;
        let source = state.item(file)?.id.clone();
        self.mutated(&mut state);
        let id = state.allocate("file");
        Ok(state.insert(Item {
            id,
            name: name.to_string(),
            parent: Some(dest_folder.to_string()),
            folder: false,
            mime: Some(target_mime.to_string()),
            copied_from: Some(source),
            sheets: Vec::new(),
        }))
    }
}

impl SpreadsheetForms for MemoryDisk {
    async fn open_spreadsheet(&self, file: &str) -> Result<Vec<Sheet>, RemoteError> {
        let state = self.begin()?;
        let item = state.item(file)?;
        Ok(item
            .sheets
            .iter()
            .enumerate()
            .map(|(index, form_id)| Sheet {
                name: format!("Sheet{}", index + 1),
                linked_form_url: form_id.as_ref().and_then(|form_id| {
                    state
                        .forms
                        .iter()
                        .find(|form| &form.id == form_id)
                        .map(|form| form.url.clone())
                }),
            })
            .collect())
    }

    async fn open_form(&self, url: &str) -> Result<LinkedForm, RemoteError> {
        let state = self.begin()?;
        state
            .forms
            .iter()
            .find(|form| form.url == url)
            .map(|form| LinkedForm {
                id: form.id.clone(),
                url: form.url.clone(),
            })
            .ok_or_else(|| RemoteError::OperationFailed(format!("no form at {url}")))
    }

    async fn detach_form(&self, form: &LinkedForm) -> Result<(), RemoteError> {
        let mut state = self.begin()?;
        self.mutated(&mut state);
        let spreadsheet = state
            .forms
            .iter_mut()
            .find(|candidate| candidate.id == form.id)
            .and_then(|candidate| candidate.spreadsheet.take());
        if let Some(spreadsheet) = spreadsheet
            && let Some(item) = state.items.iter_mut().find(|item| item.id == spreadsheet)
        {
            for sheet in &mut item.sheets {
                if sheet.as_deref() == Some(form.id.as_str()) {
                    *sheet = None;
                }
            }
        }
        Ok(())
    }

    async fn delete_form(&self, form_id: &str) -> Result<(), RemoteError> {
        let mut state = self.begin()?;
        self.mutated(&mut state);
        if let Some(form) = state.forms.iter_mut().find(|form| form.id == form_id) {
            form.trashed = true;
        }
        Ok(())
    }
}
