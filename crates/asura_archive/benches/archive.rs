use divan::AllocProfiler;

#[global_allocator]
static ALLOC: AllocProfiler = AllocProfiler::system();

fn main() {
    divan::main();
}

fn get_input() -> Vec<u8> {
    use std::io::Write;

    let mut writer = asura_archive::RsflWriter::new(
        Vec::new(),
        asura_archive::write::RsflWriterOptions::default(),
    );
    for i in 0..512u32 {
        writer
            .start_file(format!("textures\\bench\\{i:04}.dds"), i)
            .unwrap();
        writer.write_all(&vec![i as u8; 4096]).unwrap();
    }
    writer.finish().unwrap()
}

pub mod read {
    use asura_archive::{wrap_container, AsuraArchive, Wrapper};
    use divan::Bencher;

    #[divan::bench]
    fn open(bencher: Bencher) {
        bencher
            .with_inputs(super::get_input)
            .bench_values(|data| {
                divan::black_box(AsuraArchive::from_bytes(data).unwrap());
            });
    }

    #[divan::bench]
    fn open_zbb(bencher: Bencher) {
        let wrapped = wrap_container(
            &super::get_input(),
            &Wrapper::Zbb {
                chunk_sizes: vec![0x10000],
                total_size: 0,
            },
        )
        .unwrap();

        bencher.bench_local(|| {
            divan::black_box(AsuraArchive::new(wrapped.as_slice()).unwrap());
        });
    }

    #[divan::bench]
    fn access_file(bencher: Bencher) {
        bencher
            .with_inputs(|| AsuraArchive::from_bytes(super::get_input()).unwrap())
            .bench_refs(|archive| {
                let entry = archive.by_index(archive.len() / 2).unwrap();
                divan::black_box(archive.payload(entry).unwrap());
            });
    }
}

pub mod write {
    use asura_archive::{AsuraArchive, Replacements};
    use divan::Bencher;

    #[divan::bench(sample_count = 10)]
    fn repack_grown(bencher: Bencher) {
        let archive = AsuraArchive::from_bytes(super::get_input()).unwrap();
        let mut replacements = Replacements::new();
        for name in archive.file_names().step_by(16) {
            replacements.insert(name.to_owned(), vec![0xAA; 8192]);
        }

        bencher.bench_local(|| {
            divan::black_box(archive.repack(&replacements).unwrap());
        });
    }
}
