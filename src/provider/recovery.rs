//! Open-time recovery
//!
//! Recovery trusts exactly what the header commits to: the directory region
//! it names, verified against the stored CRC. Writes that were queued but
//! never checkpointed before a crash do not exist here, and block payloads
//! are NOT verified at this point; their checksums are checked lazily on
//! first read.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::BasaltConfig;
use crate::error::{BasaltError, Result};
use crate::file::StorageFile;
use crate::format::{FileHeader, HEADER_SIZE};
use crate::free_space::FreeSpaceManager;
use crate::registry::BlockRegistry;

/// What opening a storage file yields, before any background tasks exist
pub(crate) struct Opened {
    pub file: Arc<StorageFile>,
    pub page_size: u32,
    pub free_space: Arc<FreeSpaceManager>,
    pub registry: Arc<BlockRegistry>,
}

/// Open the file at `config.path`, creating it if absent.
pub(crate) fn open_or_create(config: &BasaltConfig) -> Result<Opened> {
    let (file, fresh) = StorageFile::open(&config.path)?;
    let file = Arc::new(file);
    if fresh {
        create(file, config)
    } else {
        recover(file, config)
    }
}

/// Initialize a brand-new file: header page only, empty directory.
fn create(file: Arc<StorageFile>, config: &BasaltConfig) -> Result<Opened> {
    let page_size = config.page_size;
    let header = FileHeader::new(page_size);

    // Reserve the full header page so page 0 starts at a clean boundary
    file.set_len(page_size as u64)?;
    file.write_all_at(&header.encode(), 0)?;
    file.sync_all()?;

    info!(path = %file.path().display(), page_size, "created storage file");

    let free_space = Arc::new(FreeSpaceManager::new(
        Arc::clone(&file),
        page_size as u64,
        config.min_extension_pages,
        config.growth_factor,
    ));
    Ok(Opened {
        file,
        page_size,
        free_space,
        registry: Arc::new(BlockRegistry::new()),
    })
}

/// Rebuild in-memory state from an existing file.
///
/// Steps:
/// 1. Decode and validate the header (magic, version, CRC)
/// 2. Read the directory region it names and verify the directory CRC
/// 3. Decode the entries into the registry
/// 4. Mark each live block's pages allocated; overlaps and misaligned
///    offsets are corruption
fn recover(file: Arc<StorageFile>, config: &BasaltConfig) -> Result<Opened> {
    let file_len = file.len()?;
    if file_len < HEADER_SIZE as u64 {
        return Err(BasaltError::Corrupted(format!(
            "file is {file_len} bytes, too small to hold a header"
        )));
    }

    let mut buf = [0u8; HEADER_SIZE];
    file.read_exact_at(&mut buf, 0)?;
    let header = FileHeader::decode(&buf)?;

    // The file's own page size wins over configuration; offsets in the
    // directory were computed with it
    if header.page_size != config.page_size {
        warn!(
            file = header.page_size,
            configured = config.page_size,
            "page size differs from configuration, using the file's"
        );
    }
    let page_size = header.page_size as u64;

    let dir_bytes = read_directory(&file, &header, file_len)?;

    let computed_crc = crc32fast::hash(&dir_bytes);
    if computed_crc != header.directory_crc {
        return Err(BasaltError::Corrupted(format!(
            "directory checksum mismatch (stored {:#010x}, computed {computed_crc:#010x})",
            header.directory_crc
        )));
    }

    let entries = BlockRegistry::decode_region(&dir_bytes, header.directory_entries)?;

    let free_space = Arc::new(FreeSpaceManager::with_total(
        Arc::clone(&file),
        page_size,
        config.min_extension_pages,
        config.growth_factor,
        header.total_pages,
    ));
    for (name, entry) in &entries {
        if entry.length == 0 {
            continue;
        }
        if entry.offset < page_size || entry.offset % page_size != 0 {
            return Err(BasaltError::Corrupted(format!(
                "block '{name}': misaligned offset {}",
                entry.offset
            )));
        }
        let Some(range) = entry.page_range(page_size) else {
            continue;
        };
        free_space
            .mark_allocated(range)
            .map_err(|err| BasaltError::Corrupted(format!("block '{name}': {err}")))?;
    }
    free_space.set_durable_directory(header.directory_offset, header.directory_len);

    info!(
        path = %file.path().display(),
        blocks = entries.len(),
        total_pages = header.total_pages,
        "recovered storage file"
    );

    Ok(Opened {
        file,
        page_size: header.page_size,
        free_space,
        registry: Arc::new(BlockRegistry::from_entries(entries)),
    })
}

/// Bounds-check and read the directory region the header points at.
fn read_directory(file: &StorageFile, header: &FileHeader, file_len: u64) -> Result<Vec<u8>> {
    if header.directory_len == 0 {
        return Ok(Vec::new());
    }
    if header.directory_offset < header.page_size as u64 {
        return Err(BasaltError::Corrupted(format!(
            "directory offset {} overlaps the header page",
            header.directory_offset
        )));
    }
    let dir_end = header
        .directory_offset
        .checked_add(header.directory_len)
        .ok_or_else(|| {
            BasaltError::Corrupted("directory region overflows the offset space".to_string())
        })?;
    if dir_end > file_len {
        return Err(BasaltError::Corrupted(format!(
            "directory region [{}, {dir_end}) extends past the {file_len} byte file",
            header.directory_offset
        )));
    }

    let mut bytes = vec![0u8; header.directory_len as usize];
    file.read_exact_at(&mut bytes, header.directory_offset)?;
    Ok(bytes)
}
