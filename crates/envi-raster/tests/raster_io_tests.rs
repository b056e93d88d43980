//! Integration tests: write rasters to disk and read them back.

use envi_raster::{
    create_raster, header_path, BilChunkWriter, ByteOrder, DataType, EnviHeader, EnviRaster,
    GridSource, Interleave, RasterError, RasterLayout,
};
use tempfile::TempDir;

/// Value at (row, col, band) = row * 100 + col * 10 + band.
fn expected(row: usize, col: usize, band: usize) -> f64 {
    (row * 100 + col * 10 + band) as f64
}

/// Write a raster element by element through the layout arithmetic.
fn write_raster(
    dir: &TempDir,
    name: &str,
    lines: usize,
    samples: usize,
    bands: usize,
    data_type: DataType,
    interleave: Interleave,
    order: ByteOrder,
) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut header = EnviHeader::new(lines, samples, bands, data_type);
    header.set("interleave", interleave.as_str());
    header.set(
        "byte order",
        if order == ByteOrder::BigEndian { "1" } else { "0" },
    );
    header.write(header_path(&path)).unwrap();

    let layout = RasterLayout::from_header(&header).unwrap();
    let mut bytes = vec![0u8; layout.file_len() as usize];
    for row in 0..lines {
        for col in 0..samples {
            for band in 0..bands {
                let offset = layout.byte_offset(row, band, col) as usize;
                data_type.encode(
                    expected(row, col, band),
                    order,
                    &mut bytes[offset..offset + data_type.size()],
                );
            }
        }
    }
    std::fs::write(&path, bytes).unwrap();
    path
}

#[test]
fn test_read_rows_all_interleaves() {
    let dir = TempDir::new().unwrap();
    for interleave in [Interleave::Bil, Interleave::Bip, Interleave::Bsq] {
        let path = write_raster(
            &dir,
            &format!("grid_{}", interleave),
            3,
            4,
            2,
            DataType::F32,
            interleave,
            ByteOrder::LittleEndian,
        );
        let raster = EnviRaster::open(&path).unwrap();
        assert_eq!(raster.shape().lines, 3);

        let mut row = vec![0.0; 8];
        raster.read_row(2, &mut row).unwrap();
        for col in 0..4 {
            for band in 0..2 {
                assert_eq!(row[col * 2 + band], expected(2, col, band), "{}", interleave);
            }
        }

        let mut px = vec![0.0; 2];
        raster.read_pixel(1, 3, &mut px).unwrap();
        assert_eq!(px, vec![expected(1, 3, 0), expected(1, 3, 1)]);
    }
}

#[test]
fn test_big_endian_integer_raster() {
    let dir = TempDir::new().unwrap();
    let path = write_raster(
        &dir,
        "labels.img",
        2,
        3,
        1,
        DataType::I32,
        Interleave::Bsq,
        ByteOrder::BigEndian,
    );
    let raster = EnviRaster::open(&path).unwrap();
    assert_eq!(
        raster.read_band(0).unwrap(),
        vec![0.0, 10.0, 20.0, 100.0, 110.0, 120.0]
    );
}

#[test]
fn test_truncated_data_file_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_raster(
        &dir,
        "short",
        2,
        2,
        1,
        DataType::F64,
        Interleave::Bil,
        ByteOrder::LittleEndian,
    );
    std::fs::write(&path, [0u8; 8]).unwrap();
    assert!(matches!(
        EnviRaster::open(&path).unwrap_err(),
        RasterError::InvalidHeader { .. }
    ));
}

#[test]
fn test_create_raster_is_zero_filled() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("out");
    let header = EnviHeader::new(2, 3, 2, DataType::F32);
    let layout = create_raster(&path, &header).unwrap();

    assert_eq!(std::fs::metadata(&path).unwrap().len(), layout.file_len());
    let raster = EnviRaster::open(&path).unwrap();
    for band in 0..2 {
        assert!(raster.read_band(band).unwrap().iter().all(|v| *v == 0.0));
    }
}

#[test]
fn test_concurrent_disjoint_row_writes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("atm");
    let (lines, samples, bands) = (12, 5, 3);
    create_raster(&path, &EnviHeader::new(lines, samples, bands, DataType::F64)).unwrap();
    let writer = BilChunkWriter::open(&path).unwrap();

    let ranges = [(0, 3), (3, 7), (7, 12)];
    std::thread::scope(|scope| {
        for &(start, stop) in &ranges {
            let writer = &writer;
            scope.spawn(move || {
                for row in start..stop {
                    let mut block = vec![0.0; bands * samples];
                    for band in 0..bands {
                        for col in 0..samples {
                            block[band * samples + col] = expected(row, col, band);
                        }
                    }
                    writer.write_rows(row, &block).unwrap();
                }
            });
        }
    });
    writer.flush().unwrap();

    let raster = EnviRaster::open(&path).unwrap();
    let mut row = vec![0.0; samples * bands];
    for r in 0..lines {
        raster.read_row(r, &mut row).unwrap();
        for col in 0..samples {
            for band in 0..bands {
                assert_eq!(row[col * bands + band], expected(r, col, band));
            }
        }
    }
}

#[test]
fn test_writer_rejects_partial_rows_and_overflow() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("atm");
    create_raster(&path, &EnviHeader::new(2, 2, 2, DataType::F32)).unwrap();
    let writer = BilChunkWriter::open(&path).unwrap();

    assert!(writer.write_rows(0, &[1.0; 3]).is_err());
    assert!(writer.write_rows(1, &[1.0; 8]).is_err());
    assert!(writer.write_rows(1, &[1.0; 4]).is_ok());
}

#[test]
fn test_writer_requires_bil() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bip");
    let mut header = EnviHeader::new(2, 2, 2, DataType::F32);
    header.set("interleave", "bip");
    create_raster(&path, &header).unwrap();
    assert!(matches!(
        BilChunkWriter::open(&path).unwrap_err(),
        RasterError::InterleaveMismatch { .. }
    ));
}
