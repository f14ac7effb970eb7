use std::io::Write;

use asura_archive::error::{Error, Result};
use asura_archive::write::RsflWriterOptions;
use asura_archive::{wrap_container, AsuraArchive, EntryKind, LoadOptions, RsflWriter, Wrapper};
use pretty_assertions::assert_eq;
use tempfile::NamedTempFile;
use tracing_test::traced_test;

const FILES: [(&str, &[u8]); 3] = [
    ("textures\\wolf.tga", b"DDS wolf texture bytes"),
    ("textures\\ui\\menu.tga", b"menu"),
    ("sounds\\howl.wav", b"RIFF....WAVE"),
];

fn rsfl_archive() -> Result<Vec<u8>> {
    let mut writer = RsflWriter::new(
        Vec::new(),
        RsflWriterOptions::builder().chunk_type1(1).table_type1(2).build(),
    );
    for (index, (name, data)) in FILES.iter().enumerate() {
        writer.start_file(name, index as u32)?;
        writer.write_all(data)?;
    }
    writer.finish()
}

fn write_temp(data: &[u8]) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    file.write_all(data)?;
    file.flush()?;
    Ok(file)
}

fn assert_payloads(archive: &AsuraArchive) -> Result<()> {
    assert_eq!(archive.len(), FILES.len());
    for ((name, data), entry) in FILES.iter().zip(archive.entries()) {
        assert_eq!(&*entry.name, *name);
        assert_eq!(archive.payload(entry)?, *data);
    }
    Ok(())
}

#[traced_test]
#[test]
fn load_from_file() -> Result<()> {
    let file = write_temp(&rsfl_archive()?)?;
    let archive = AsuraArchive::open(file.path())?;

    assert_payloads(&archive)?;
    assert_eq!(archive.wrapper(), &Wrapper::Raw);
    assert_eq!(
        archive.file_names().collect::<Vec<_>>(),
        vec!["textures/wolf.tga", "textures/ui/menu.tga", "sounds/howl.wav"]
    );

    let EntryKind::Rsfl(rsfl) = archive.by_name("sounds/howl.wav")?.kind else {
        panic!("expected an RSFL entry");
    };
    assert_eq!(rsfl.unk, 2);

    Ok(())
}

#[test]
fn loading_twice_is_stable() -> Result<()> {
    let file = write_temp(&rsfl_archive()?)?;

    let first = AsuraArchive::open(file.path())?;
    let second = AsuraArchive::open(file.path())?;

    assert_eq!(
        first.entries().collect::<Vec<_>>(),
        second.entries().collect::<Vec<_>>()
    );

    Ok(())
}

#[test]
fn mapped_and_heap_loads_agree() -> Result<()> {
    let file = write_temp(&rsfl_archive()?)?;

    let mapped = AsuraArchive::open_with(
        file.path(),
        &LoadOptions::builder().memory_map_threshold(0).build(),
    )?;
    let heap = AsuraArchive::open_with(
        file.path(),
        &LoadOptions::builder().memory_map_threshold(u64::MAX).build(),
    )?;

    assert!(mapped.is_mapped());
    assert!(!heap.is_mapped());
    assert_payloads(&mapped)?;
    assert_eq!(
        mapped.entries().collect::<Vec<_>>(),
        heap.entries().collect::<Vec<_>>()
    );

    Ok(())
}

#[test]
fn load_zlb_archive() -> Result<()> {
    let wrapped = wrap_container(
        &rsfl_archive()?,
        &Wrapper::Zlb {
            unknown: 0xC0FFEE,
            expected_size: 0,
        },
    )?;
    assert!(wrapped.starts_with(b"AsuraZlb"));

    let file = write_temp(&wrapped)?;
    let archive = AsuraArchive::open_with(
        file.path(),
        &LoadOptions::builder().memory_map_threshold(0).build(),
    )?;

    assert!(!archive.is_mapped());
    assert_payloads(&archive)?;
    assert!(matches!(
        archive.wrapper(),
        Wrapper::Zlb {
            unknown: 0xC0FFEE,
            ..
        }
    ));

    Ok(())
}

#[test]
fn load_zbb_archive() -> Result<()> {
    let raw = rsfl_archive()?;
    let wrapped = wrap_container(
        &raw,
        &Wrapper::Zbb {
            chunk_sizes: vec![64, 32],
            total_size: 0,
        },
    )?;

    let archive = AsuraArchive::new(wrapped.as_slice())?;

    assert_payloads(&archive)?;
    let Wrapper::Zbb {
        chunk_sizes,
        total_size,
    } = archive.wrapper()
    else {
        panic!("expected a zbb wrapper");
    };
    assert_eq!(chunk_sizes[..2], [64, 32]);
    assert_eq!(*total_size as usize, raw.len());
    assert_eq!(archive.data(), raw.as_slice());

    Ok(())
}

#[test]
fn unknown_wrapper_fails() {
    assert!(matches!(
        AsuraArchive::from_bytes(b"AsuraXyz\0\0\0\0\0\0\0\0".to_vec()),
        Err(Error::UnsupportedWrapper(_))
    ));
}
