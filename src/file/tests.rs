//! 测试模块

use super::*;
use proptest::prelude::Rng;
use proptest::test_runner::{RngAlgorithm, TestRng};
use tempfile::tempdir;

/// 测试用极小页面：64 字节页面 + 8 字节重叠区
fn tiny_pages() -> PageConfig {
    PageConfig::writer().with_page_size(64).with_overlap(8)
}

/// 写入 `count` 个 i64，第 i 个值为 `reference(i)`
fn write_reference_file(path: &std::path::Path, count: u64) {
    let writer = PagedWriter::create_with(path, tiny_pages()).unwrap();
    for i in 0..count {
        writer.put_i64(reference(i)).unwrap();
    }
    drop(writer);
}

fn reference(i: u64) -> i64 {
    (i as i64).wrapping_mul(7919) ^ 0x5555
}

/// 可复现的随机数生成器，同一 seed 产生相同的访问序列
fn seeded_rng(seed: u8) -> TestRng {
    TestRng::from_seed(RngAlgorithm::ChaCha, &[seed; 32])
}

/// varint 编解码测试
#[cfg(test)]
mod varint_tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_smallest_width_is_chosen() {
        let mut buf = [0u8; 8];

        assert_eq!(varint::encode_i16(0, &mut buf).unwrap(), 1);
        assert_eq!(varint::encode_i16(127, &mut buf).unwrap(), 1);
        assert_eq!(varint::encode_i16(128, &mut buf).unwrap(), 2);

        assert_eq!(varint::encode_i32(63, &mut buf).unwrap(), 1);
        assert_eq!(varint::encode_i32(64, &mut buf).unwrap(), 2);
        assert_eq!(varint::encode_i32((1 << 14) - 1, &mut buf).unwrap(), 2);
        assert_eq!(varint::encode_i32(1 << 14, &mut buf).unwrap(), 3);
        assert_eq!(varint::encode_i32(varint::MAX_I32, &mut buf).unwrap(), 4);

        assert_eq!(varint::encode_i64(63, &mut buf).unwrap(), 1);
        assert_eq!(varint::encode_i64((1 << 30) - 1, &mut buf).unwrap(), 4);
        assert_eq!(varint::encode_i64(1 << 30, &mut buf).unwrap(), 8);
        assert_eq!(varint::encode_i64(varint::MAX_I64, &mut buf).unwrap(), 8);
    }

    #[test]
    fn test_tag_announces_width() {
        let mut buf = [0u8; 8];
        for value in [0i64, 63, 64, 16_383, 16_384, (1 << 30) - 1, 1 << 30, varint::MAX_I64] {
            let width = varint::encode_i64(value, &mut buf).unwrap();
            assert_eq!(varint::width_i64(buf[0]), width, "value {}", value);
        }
    }

    #[test]
    fn test_out_of_range_is_rejected() {
        let mut buf = [0u8; 8];

        // 负数和超出半范围的值必须报错，绝不回绕
        for result in [
            varint::encode_i16(-1, &mut buf),
            varint::encode_i16(varint::MAX_I16 + 1, &mut buf),
            varint::encode_i16(i16::MAX, &mut buf),
            varint::encode_i32(-1, &mut buf),
            varint::encode_i32(varint::MAX_I32 + 1, &mut buf),
            varint::encode_i32(i32::MIN, &mut buf),
            varint::encode_i64(-1, &mut buf),
            varint::encode_i64(varint::MAX_I64 + 1, &mut buf),
            varint::encode_i64(i64::MAX, &mut buf),
        ] {
            let err = result.unwrap_err();
            assert!(matches!(err, Error::VarintRange { .. }), "{:?}", err);
            assert_eq!(err.kind(), ErrorKind::Format);
        }
    }

    #[test]
    fn test_short_output_buffer() {
        let mut buf = [0u8; 1];
        let err = varint::encode_i32(1000, &mut buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Bounds);
    }

    #[test]
    fn test_truncated_input() {
        let mut buf = [0u8; 8];
        let width = varint::encode_i64(1 << 40, &mut buf).unwrap();
        assert_eq!(width, 8);

        let err = varint::decode_i64(&buf[..5]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Bounds);
        assert!(varint::decode_i64(&[]).is_err());
    }

    proptest! {
        #[test]
        fn prop_i16_round_trip(value in 0..=varint::MAX_I16) {
            let mut buf = [0u8; 2];
            let width = varint::encode_i16(value, &mut buf).unwrap();
            prop_assert_eq!(varint::width_i16(buf[0]), width);
            prop_assert_eq!(varint::decode_i16(&buf[..width]).unwrap(), value);
        }

        #[test]
        fn prop_i32_round_trip(value in 0..=varint::MAX_I32) {
            let mut buf = [0u8; 4];
            let width = varint::encode_i32(value, &mut buf).unwrap();
            prop_assert_eq!(varint::width_i32(buf[0]), width);
            prop_assert_eq!(varint::decode_i32(&buf[..width]).unwrap(), value);
        }

        #[test]
        fn prop_i64_round_trip(value in 0..=varint::MAX_I64) {
            let mut buf = [0u8; 8];
            let width = varint::encode_i64(value, &mut buf).unwrap();
            prop_assert_eq!(varint::width_i64(buf[0]), width);
            prop_assert_eq!(varint::decode_i64(&buf[..width]).unwrap(), value);
        }

        #[test]
        fn prop_i64_rejects_above_range(value in (varint::MAX_I64 + 1)..=i64::MAX) {
            let mut buf = [0u8; 8];
            prop_assert!(varint::encode_i64(value, &mut buf).is_err());
        }
    }
}

/// PageConfig 测试
#[cfg(test)]
mod config_tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(PageConfig::reader().validate().is_ok());
        assert!(PageConfig::writer().validate().is_ok());
        assert_eq!(PageConfig::default(), PageConfig::reader());
        assert_eq!(PageConfig::reader().cache_pages(), 1);
        assert!(PageConfig::writer().page_size() < PageConfig::reader().page_size());
    }

    #[test]
    fn test_invalid_geometry_is_rejected() {
        for config in [
            PageConfig::reader().with_page_size(0),
            PageConfig::reader().with_overlap(MIN_OVERLAP - 1),
            PageConfig::reader().with_cache_pages(0),
            PageConfig::reader().with_page_size(MAX_MAP_LEN),
        ] {
            let err = config.validate().unwrap_err();
            assert!(matches!(err, Error::InvalidConfig { .. }), "{:?}", err);
        }
    }

    #[test]
    fn test_engines_reject_invalid_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("invalid_config.bin");

        let config = PageConfig::writer().with_overlap(4);
        assert!(PagedWriter::create_with(&path, config).is_err());
        // 配置无效时不应创建文件
        assert!(!path.exists());
    }

    #[test]
    fn test_locate() {
        let config = tiny_pages();
        assert_eq!(config.locate(0), (0, 0));
        assert_eq!(config.locate(63), (0, 63));
        assert_eq!(config.locate(64), (1, 0));
        assert_eq!(config.locate(130), (2, 2));
    }
}

/// PagedWriter 测试
#[cfg(test)]
mod paged_writer_tests {
    use super::*;

    #[test]
    fn test_primitive_round_trip_at_cursor() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("writer_cursor.bin");

        let writer = PagedWriter::create_with(&path, tiny_pages()).unwrap();
        let ints = [0i32, 1, -1, i32::MIN, i32::MAX];
        let longs = [0i64, 1, -1, i64::MIN, i64::MAX];
        let shorts = [0i16, 1, -1, i16::MIN, i16::MAX];
        let doubles = [0.0f64, 1.0, -1.0, f64::MIN, f64::MAX];
        let floats = [0.0f32, 1.0, -1.0, f32::MIN, f32::MAX];

        for i in 0..5 {
            writer.put_u8(i as u8 * 60).unwrap();
            writer.put_i8(-(i as i8)).unwrap();
            writer.put_ascii((b'a' + i as u8) as char).unwrap();
            writer.put_char16(u16::MAX - i as u16).unwrap();
            writer.put_i16(shorts[i]).unwrap();
            writer.put_i32(ints[i]).unwrap();
            writer.put_i64(longs[i]).unwrap();
            writer.put_f32(floats[i]).unwrap();
            writer.put_f64(doubles[i]).unwrap();
        }
        let written = writer.position();
        assert_eq!(written, 5 * (1 + 1 + 1 + 2 + 2 + 4 + 8 + 4 + 8));
        assert_eq!(writer.len(), written);

        // 关闭后以只读方式重新打开，所有值都跨越了多个 64 字节页面
        let reader = writer.into_reader_with(PageConfig::reader().with_page_size(64).with_overlap(8)).unwrap();
        for i in 0..5 {
            assert_eq!(reader.get_u8().unwrap(), i as u8 * 60);
            assert_eq!(reader.get_i8().unwrap(), -(i as i8));
            assert_eq!(reader.get_ascii().unwrap(), (b'a' + i as u8) as char);
            assert_eq!(reader.get_char16().unwrap(), u16::MAX - i as u16);
            assert_eq!(reader.get_i16().unwrap(), shorts[i]);
            assert_eq!(reader.get_i32().unwrap(), ints[i]);
            assert_eq!(reader.get_i64().unwrap(), longs[i]);
            assert_eq!(reader.get_f32().unwrap().to_bits(), floats[i].to_bits());
            assert_eq!(reader.get_f64().unwrap().to_bits(), doubles[i].to_bits());
        }
        assert_eq!(reader.position(), written);
        assert!(!reader.has_remaining());
    }

    #[test]
    fn test_primitive_round_trip_at_offset() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("writer_offset.bin");

        let writer = PagedWriter::create_with(&path, tiny_pages()).unwrap();

        // 乱序写入
        writer.put_f64_at(200, f64::MIN_POSITIVE).unwrap();
        writer.put_i64_at(0, i64::MIN).unwrap();
        writer.put_i32_at(100, -1).unwrap();
        writer.put_i16_at(61, i16::MAX).unwrap();
        writer.put_u8_at(150, 0xAB).unwrap();

        // 显式偏移的写入不移动游标
        assert_eq!(writer.position(), 0);
        assert_eq!(writer.len(), 208);

        assert_eq!(writer.get_f64_at(200).unwrap(), f64::MIN_POSITIVE);
        assert_eq!(writer.get_i64_at(0).unwrap(), i64::MIN);
        assert_eq!(writer.get_i32_at(100).unwrap(), -1);
        assert_eq!(writer.get_i16_at(61).unwrap(), i16::MAX);
        assert_eq!(writer.get_u8_at(150).unwrap(), 0xAB);

        // 未写入的间隙读出为 0
        assert_eq!(writer.get_i32_at(104).unwrap(), 0);
        assert_eq!(writer.position(), 0);
    }

    #[test]
    fn test_page_boundary_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("writer_boundary.bin");
        let config = tiny_pages();
        let page = config.page_size();

        let writer = PagedWriter::create_with(&path, config).unwrap();
        for k in 1..=7u64 {
            let value = 0x0102_0304_0506_0708i64 * k as i64;
            let offset = page * k - k;
            writer.put_i64_at(offset, value).unwrap();
            assert_eq!(writer.get_i64_at(offset).unwrap(), value, "k = {}", k);
        }

        let reader = writer.into_reader_with(PageConfig::reader().with_page_size(64).with_overlap(8)).unwrap();
        for k in 1..=7u64 {
            let value = 0x0102_0304_0506_0708i64 * k as i64;
            assert_eq!(reader.get_i64_at(page * k - k).unwrap(), value, "k = {}", k);
        }
    }

    #[test]
    fn test_bulk_bytes_span_many_pages() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("writer_bulk.bin");

        let writer = PagedWriter::create_with(&path, tiny_pages()).unwrap();
        let data: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();

        writer.put_bytes_at(37, &data).unwrap();
        assert_eq!(writer.len(), 1037);
        // 只保留一个映射页面
        assert_eq!(writer.resident_pages(), 1);

        let mut buf = vec![0u8; 1000];
        writer.get_bytes_at(37, &mut buf).unwrap();
        assert_eq!(buf, data);

        writer.seek(37).unwrap();
        assert_eq!(writer.get_vec(1000).unwrap(), data);
        assert_eq!(writer.position(), 1037);
    }

    #[test]
    fn test_close_truncates_to_bytes_written() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("writer_truncate.bin");

        let mut writer = PagedWriter::create_with(&path, tiny_pages()).unwrap();
        writer.put_bytes(&[7u8; 100]).unwrap();

        // 写入过程中文件按页增长：(1 + 1) * 64 + 8
        assert_eq!(writer.file_len(), 136);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 136);

        writer.close().unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 100);

        // 重复关闭不产生效果
        writer.close().unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 100);
    }

    #[test]
    fn test_default_geometry_truncates_exactly() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("writer_default_truncate.bin");

        let mut writer = PagedWriter::create(&path).unwrap();
        writer.put_i32(5).unwrap();
        writer.put_i64(6).unwrap();
        writer.close().unwrap();

        assert_eq!(std::fs::metadata(&path).unwrap().len(), 12);
    }

    #[test]
    fn test_drop_finalizes_writer() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("writer_drop.bin");

        {
            let writer = PagedWriter::create_with(&path, tiny_pages()).unwrap();
            writer.put_bytes(&[1u8; 10]).unwrap();
        }

        assert_eq!(std::fs::metadata(&path).unwrap().len(), 10);
        // 锁已释放，可以再次创建
        assert!(PagedWriter::create(&path).is_ok());
    }

    #[test]
    fn test_exclusive_lock() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("writer_lock.bin");

        let mut first = PagedWriter::create(&path).unwrap();
        first.put_i32(1).unwrap();

        let err = PagedWriter::open(&path).unwrap_err();
        assert!(matches!(err, Error::Locked { .. }), "{:?}", err);
        assert_eq!(err.kind(), ErrorKind::Io);

        // 第二个写入者不能截断第一个写入者的文件
        let err = PagedWriter::create(&path).unwrap_err();
        assert!(matches!(err, Error::Locked { .. }), "{:?}", err);

        first.close().unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 4);

        let second = PagedWriter::open(&path).unwrap();
        assert_eq!(second.len(), 4);
        assert_eq!(second.get_i32().unwrap(), 1);
    }

    #[test]
    fn test_open_existing_keeps_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("writer_reopen.bin");

        let mut writer = PagedWriter::create_with(&path, tiny_pages()).unwrap();
        for i in 0..20 {
            writer.put_i32(i).unwrap();
        }
        writer.close().unwrap();

        // 重新打开后原内容计为已写入，追加写入延长文件
        let mut writer = PagedWriter::open_with(&path, tiny_pages()).unwrap();
        assert_eq!(writer.max_length(), 80);
        writer.seek(80).unwrap();
        writer.put_i32(20).unwrap();
        writer.put_i32_at(0, -5).unwrap();
        writer.close().unwrap();

        let reader = PagedReader::open(&path).unwrap();
        assert_eq!(reader.len(), 84);
        assert_eq!(reader.get_i32_at(0).unwrap(), -5);
        assert_eq!(reader.get_i32_at(40).unwrap(), 10);
        assert_eq!(reader.get_i32_at(80).unwrap(), 20);
    }

    #[test]
    fn test_seek_is_bounded_by_bytes_written() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("writer_seek.bin");

        let writer = PagedWriter::create_with(&path, tiny_pages()).unwrap();
        writer.put_i64(1).unwrap();

        assert!(writer.seek(8).is_ok());
        let err = writer.seek(9).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Bounds);
        assert_eq!(writer.position(), 8);

        // 高水位之后的读取失败
        assert_eq!(writer.get_u8().unwrap_err().kind(), ErrorKind::Bounds);
    }

    #[test]
    fn test_write_past_max_file_len_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("writer_huge_offset.bin");

        let writer = PagedWriter::create_with(&path, tiny_pages()).unwrap();
        for offset in [u64::MAX - 16, u64::MAX - 7, MAX_FILE_LEN - 7] {
            let err = writer.put_i64_at(offset, 1).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Bounds, "offset {}", offset);
            assert!(writer.put_bytes_at(offset, &[0u8; 100]).is_err());
        }

        // 失败的写入不改变高水位，也不扩展文件
        assert_eq!(writer.len(), 0);
        assert_eq!(writer.file_len(), 0);
        assert!(writer.put_i64_at(0, 1).is_ok());
    }

    #[test]
    fn test_strings() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("writer_strings.bin");

        let writer = PagedWriter::create_with(&path, tiny_pages()).unwrap();
        let long: String = (0..300).map(|i| (b'A' + (i % 26) as u8) as char).collect();

        writer.put_string(None).unwrap();
        writer.put_string(Some("")).unwrap();
        writer.put_string(Some("chr17:41196312")).unwrap();
        writer.put_string(Some(&long)).unwrap();
        assert_eq!(writer.position(), 4 + 4 + (4 + 14) + (4 + 300));

        let reader = writer.into_reader().unwrap();
        assert_eq!(reader.get_string().unwrap(), None);
        assert_eq!(reader.get_string().unwrap().as_deref(), Some(""));
        assert_eq!(reader.get_string().unwrap().as_deref(), Some("chr17:41196312"));
        assert_eq!(reader.get_string().unwrap(), Some(long));
        assert!(!reader.has_remaining());

        // 显式偏移读取
        assert_eq!(reader.get_string_at(8).unwrap().as_deref(), Some("chr17:41196312"));
    }

    #[test]
    fn test_non_ascii_string_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("writer_non_ascii.bin");

        let writer = PagedWriter::create_with(&path, tiny_pages()).unwrap();
        let err = writer.put_string(Some("naïve")).unwrap_err();
        assert!(matches!(err, Error::NonAscii { ch: 'ï' }), "{:?}", err);
        assert!(writer.put_ascii('é').is_err());

        // 失败的写入不留下任何字节
        assert_eq!(writer.len(), 0);
        assert_eq!(writer.position(), 0);
    }

    #[test]
    fn test_malformed_string_length() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("writer_bad_len.bin");

        let writer = PagedWriter::create_with(&path, tiny_pages()).unwrap();
        writer.put_i32(-2).unwrap();
        writer.put_i32(1000).unwrap();

        let err = writer.get_string_at(0).unwrap_err();
        assert!(matches!(err, Error::NegativeLength { len: -2 }), "{:?}", err);

        // 长度超出文件末尾
        let err = writer.get_string_at(4).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Bounds);
    }

    #[test]
    fn test_latin1_bytes_decode_losslessly() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("writer_latin1.bin");

        let writer = PagedWriter::create(&path).unwrap();
        writer.put_i32(2).unwrap();
        writer.put_bytes(&[0xE9, b'x']).unwrap();

        assert_eq!(writer.get_string_at(0).unwrap().as_deref(), Some("éx"));
    }

    #[test]
    fn test_varints() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("writer_varints.bin");

        let writer = PagedWriter::create_with(&path, tiny_pages()).unwrap();
        writer.put_var_i16(5).unwrap();
        writer.put_var_i16(varint::MAX_I16).unwrap();
        writer.put_var_i32(70).unwrap();
        writer.put_var_i32(varint::MAX_I32).unwrap();
        writer.put_var_i64(1 << 35).unwrap();
        assert_eq!(writer.position(), 1 + 2 + 2 + 4 + 8);

        // 超出范围不写入任何字节
        assert!(writer.put_var_i32(-7).is_err());
        assert_eq!(writer.position(), 17);

        let reader = writer.into_reader().unwrap();
        assert_eq!(reader.get_var_i16().unwrap(), 5);
        assert_eq!(reader.get_var_i16().unwrap(), varint::MAX_I16);
        assert_eq!(reader.get_var_i32().unwrap(), 70);
        assert_eq!(reader.get_var_i32().unwrap(), varint::MAX_I32);
        assert_eq!(reader.get_var_i64().unwrap(), 1 << 35);
        assert!(reader.get_var_i64().is_err());
    }

    #[test]
    fn test_access_after_close() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("writer_closed.bin");

        let mut writer = PagedWriter::create(&path).unwrap();
        writer.put_i32(1).unwrap();
        writer.close().unwrap();

        assert!(writer.is_closed());
        let err = writer.put_i32_at(0, 2).unwrap_err();
        assert!(matches!(err, Error::Closed));
        assert_eq!(err.kind(), ErrorKind::Lifecycle);
        assert!(matches!(writer.get_i32_at(0).unwrap_err(), Error::Closed));
        assert!(matches!(writer.flush().unwrap_err(), Error::Closed));
    }

    #[test]
    fn test_larger_cache() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("writer_cache.bin");

        let writer = PagedWriter::create_with(&path, tiny_pages().with_cache_pages(3)).unwrap();
        for page in 0..6u64 {
            writer.put_i32_at(page * 64, page as i32).unwrap();
            assert!(writer.resident_pages() <= 3);
        }
        assert_eq!(writer.resident_pages(), 3);

        writer.flush().unwrap();
        for page in 0..6u64 {
            assert_eq!(writer.get_i32_at(page * 64).unwrap(), page as i32);
        }
    }
}

/// PagedReader 测试
#[cfg(test)]
mod paged_reader_tests {
    use super::*;

    fn tiny_reader(path: &std::path::Path) -> PagedReader {
        PagedReader::open_with(path, PageConfig::reader().with_page_size(64).with_overlap(8)).unwrap()
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.bin");

        let err = PagedReader::open(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        // 错误信息包含路径
        assert!(err.to_string().contains("missing.bin"), "{}", err);
    }

    #[test]
    fn test_eof_fails_without_wrapping() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reader_eof.bin");
        write_reference_file(&path, 16);

        let reader = tiny_reader(&path);
        assert_eq!(reader.len(), 128);

        reader.seek(128).unwrap();
        let err = reader.get_u8().unwrap_err();
        assert!(matches!(err, Error::OutOfBounds { offset: 128, len: 1, size: 128 }), "{:?}", err);
        // 游标保持不变，不会回绕到 0
        assert_eq!(reader.position(), 128);

        assert!(reader.get_i64_at(121).is_err());
        assert_eq!(reader.get_i64_at(120).unwrap(), reference(15));

        assert_eq!(reader.seek(129).unwrap_err().kind(), ErrorKind::Bounds);
    }

    #[test]
    fn test_single_resident_page() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reader_single_page.bin");
        write_reference_file(&path, 64);

        let reader = tiny_reader(&path);
        assert_eq!(reader.resident_pages(), 0);

        // 随机跳跃访问，始终只有一个页面被映射
        let mut rng = seeded_rng(7);
        for _ in 0..200 {
            let i = rng.next_u64() % 64;
            assert_eq!(reader.get_i64_at(i * 8).unwrap(), reference(i));
            assert_eq!(reader.resident_pages(), 1);
        }
    }

    #[test]
    fn test_sequential_scan() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reader_scan.bin");
        write_reference_file(&path, 100);

        let reader = tiny_reader(&path);
        let mut i = 0;
        while reader.has_remaining() {
            assert_eq!(reader.get_i64().unwrap(), reference(i));
            i += 1;
        }
        assert_eq!(i, 100);
    }

    #[test]
    fn test_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reader_empty.bin");
        std::fs::File::create(&path).unwrap();

        let reader = PagedReader::open(&path).unwrap();
        assert!(reader.is_empty());
        assert_eq!(reader.get_u8().unwrap_err().kind(), ErrorKind::Bounds);
        assert_eq!(reader.resident_pages(), 0);
    }

    #[test]
    fn test_close_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reader_close.bin");
        write_reference_file(&path, 8);

        let mut reader = tiny_reader(&path);
        assert_eq!(reader.get_i64().unwrap(), reference(0));
        assert_eq!(reader.resident_pages(), 1);

        reader.close();
        assert_eq!(reader.resident_pages(), 0);
        reader.close();

        let err = reader.get_i64().unwrap_err();
        assert!(matches!(err, Error::Closed), "{:?}", err);
        assert!(matches!(reader.get_i64_at(1000).unwrap_err(), Error::Closed));
    }

    #[test]
    fn test_view_range_is_validated() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reader_view_range.bin");
        write_reference_file(&path, 8);

        let reader = tiny_reader(&path);
        assert!(reader.view(0, 64).is_ok());
        assert!(matches!(reader.view(0, 65).unwrap_err(), Error::InvalidRange { .. }));
        assert!(matches!(reader.view(10, 5).unwrap_err(), Error::InvalidRange { .. }));
    }

    #[test]
    fn test_skip_and_remaining() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reader_skip.bin");
        write_reference_file(&path, 8);

        let reader = tiny_reader(&path);
        reader.skip(16).unwrap();
        assert_eq!(reader.remaining(), 48);
        assert_eq!(reader.get_i64().unwrap(), reference(2));
        assert!(reader.skip(100).is_err());
        assert!(reader.skip(u64::MAX).is_err());
        assert_eq!(reader.position(), 24);
    }
}

/// WindowedView 测试
#[cfg(test)]
mod view_tests {
    use super::*;

    #[test]
    fn test_views_do_not_share_cursors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("view_isolation.bin");
        write_reference_file(&path, 32);

        let reader = PagedReader::open(&path).unwrap();
        let left = reader.view(0, 128).unwrap();
        let right = reader.view(128, 256).unwrap();

        assert_eq!(left.get_i64().unwrap(), reference(0));
        assert_eq!(left.get_i64().unwrap(), reference(1));
        assert_eq!(right.get_i64().unwrap(), reference(16));

        assert_eq!(left.position(), 16);
        assert_eq!(right.position(), 8);
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn test_logical_size_and_bounds() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("view_bounds.bin");
        write_reference_file(&path, 32);

        let reader = PagedReader::open(&path).unwrap();
        let view = reader.view(64, 80).unwrap();
        assert_eq!(view.len(), 16);
        assert_eq!((view.start(), view.end()), (64, 80));

        assert_eq!(view.get_i64_at(8).unwrap(), reference(9));
        // 底层文件还有数据，但超出视图范围
        assert_eq!(view.get_i64_at(9).unwrap_err().kind(), ErrorKind::Bounds);
        assert!(view.seek(17).is_err());

        view.seek(16).unwrap();
        assert!(view.get_u8().is_err());
    }

    #[test]
    fn test_nested_views() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("view_nested.bin");
        write_reference_file(&path, 32);

        let reader = PagedReader::open(&path).unwrap();
        let outer = reader.view(80, 240).unwrap();
        let inner = outer.view(16, 32).unwrap();
        assert_eq!((inner.start(), inner.end()), (96, 112));
        assert_eq!(inner.get_i64().unwrap(), reference(12));

        // 兄弟视图通过绝对范围组合
        let sibling = reader.view(inner.end(), outer.end()).unwrap();
        assert_eq!(sibling.get_i64().unwrap(), reference(14));

        assert!(outer.view(0, 161).is_err());
    }

    #[test]
    fn test_views_do_not_map() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("view_no_map.bin");
        write_reference_file(&path, 32);

        let reader = PagedReader::open(&path).unwrap();
        {
            let view = reader.view(0, 64).unwrap();
            let nested = view.view(8, 16).unwrap();
            // 嵌套视图直接借用原始读取器，而不是外层视图
            assert!(std::ptr::eq(nested.backing(), &reader));
            assert_eq!(nested.backing().len(), 256);
            assert_eq!(reader.resident_pages(), 0);
        }
        assert_eq!(reader.resident_pages(), 0);
    }

    #[test]
    fn test_writable_view_over_writer() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("view_writer.bin");

        let mut writer = PagedWriter::create_with(&path, tiny_pages()).unwrap();
        {
            let header = writer.view(0, 8).unwrap();
            let body = writer.view(8, 200).unwrap();

            body.put_string(Some("payload")).unwrap();
            body.put_i64(-9).unwrap();
            header.put_i64(body.position() as i64).unwrap();

            // 超出视图范围的写入被拒绝
            assert_eq!(header.put_u8(1).unwrap_err().kind(), ErrorKind::Bounds);
        }
        writer.close().unwrap();

        let reader = PagedReader::open(&path).unwrap();
        assert_eq!(reader.len(), 8 + 11 + 8);
        let body_len = reader.get_i64().unwrap() as u64;
        let body = reader.view(8, 8 + body_len).unwrap();
        assert_eq!(body.get_string().unwrap().as_deref(), Some("payload"));
        assert_eq!(body.get_i64().unwrap(), -9);
    }

    #[test]
    fn test_view_over_seek_reader() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("view_seek.bin");
        write_reference_file(&path, 8);

        let reader = SeekReader::open(&path).unwrap();
        let view = WindowedView::new(&reader, 16, 32).unwrap();
        assert_eq!(view.get_i64().unwrap(), reference(2));
        assert_eq!(view.get_i64().unwrap(), reference(3));
        assert!(view.get_i64().is_err());

        assert!(WindowedView::new(&reader, 5, 4).is_err());
    }
}

/// ConcurrentWindowedView 测试
#[cfg(test)]
mod concurrent_view_tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_types_are_thread_safe() {
        assert_send_sync::<SharedPagedReader>();
        assert_send_sync::<ConcurrentWindowedView>();
    }

    #[test]
    fn test_concurrent_random_reads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("concurrent_random.bin");
        let count = 4096u64;
        write_reference_file(&path, count);

        let shared = SharedPagedReader::open_with(&path, PageConfig::reader().with_page_size(256).with_overlap(8)).unwrap();

        // 8 个线程，各自拥有可能重叠的视图，随机读取并与参考值比较
        std::thread::scope(|s| {
            for t in 0..8u64 {
                let shared = shared.clone();
                s.spawn(move || {
                    let first = t * 256;
                    let last = (first + 2048).min(count);
                    let view = shared.view(first * 8, last * 8).unwrap();
                    let slots = last - first;

                    let mut rng = seeded_rng(t as u8 + 1);
                    for _ in 0..2000 {
                        let i = rng.next_u64() % slots;
                        assert_eq!(view.get_i64_at(i * 8).unwrap(), reference(first + i));

                        view.seek(i * 8).unwrap();
                        assert_eq!(view.get_i64().unwrap(), reference(first + i));
                        assert_eq!(view.position(), i * 8 + 8);
                    }
                });
            }
        });

        assert!(shared.resident_pages() <= 1);
        assert!(shared.maps_performed() >= 1);
    }

    #[test]
    fn test_cursor_is_per_thread() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("concurrent_cursor.bin");
        write_reference_file(&path, 64);

        let shared = SharedPagedReader::open(&path).unwrap();
        let view = shared.view(0, shared.len()).unwrap();

        view.seek(40).unwrap();

        std::thread::scope(|s| {
            for t in 0..4u64 {
                let view = &view;
                s.spawn(move || {
                    // 新线程看到的游标从 0 开始
                    assert_eq!(view.position(), 0);
                    view.seek(t * 64).unwrap();
                    for j in 0..8 {
                        assert_eq!(view.get_i64().unwrap(), reference(t * 8 + j));
                    }
                    assert_eq!(view.position(), t * 64 + 64);
                });
            }
        });

        // 其他线程的读取不影响当前线程的游标
        assert_eq!(view.position(), 40);
        assert_eq!(view.get_i64().unwrap(), reference(5));
    }

    #[test]
    fn test_cursor_slots_live_in_the_view() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("concurrent_slots.bin");
        write_reference_file(&path, 16);

        let shared = SharedPagedReader::open(&path).unwrap();
        let mut view = shared.view(0, 128).unwrap();
        assert_eq!(view.cursor_slots(), 0);

        // 只读取位置不会分配槽位
        assert_eq!(view.position(), 0);
        assert_eq!(view.cursor_slots(), 0);

        std::thread::scope(|s| {
            let view = &view;
            s.spawn(move || view.seek(8).unwrap());
        });
        assert_eq!(view.cursor_slots(), 1);

        view.seek(16).unwrap();
        assert_eq!(view.cursor_slots(), 2);

        // 克隆不继承任何线程的槽位
        let mut copy = view.clone();
        assert_eq!(copy.cursor_slots(), 0);
        assert_eq!(copy.shared().len(), view.shared().len());
        assert_eq!(copy.shared().maps_performed(), shared.maps_performed());
    }

    #[test]
    fn test_worker_cursors_do_not_outlive_views() {
        use std::sync::Arc;
        use std::sync::mpsc;

        let dir = tempdir().unwrap();
        let path = dir.path().join("concurrent_worker.bin");
        write_reference_file(&path, 16);
        let shared = SharedPagedReader::open(&path).unwrap();

        let (to_worker, jobs) = mpsc::channel::<Arc<ConcurrentWindowedView>>();
        let (to_main, done) = mpsc::channel::<u64>();

        // 常驻工作线程在每个视图上移动游标，视图由主线程创建和丢弃
        let worker = std::thread::spawn(move || {
            for view in jobs {
                let before = view.position();
                view.seek(8).unwrap();
                assert_eq!(view.get_i64().unwrap(), reference(1));
                drop(view);
                to_main.send(before).unwrap();
            }
        });

        for _ in 0..10_000 {
            let view = Arc::new(shared.view(0, 128).unwrap());
            to_worker.send(Arc::clone(&view)).unwrap();
            // 新视图在工作线程上总是从 0 开始
            assert_eq!(done.recv().unwrap(), 0);

            // 工作线程的游标随视图一起释放
            let mut view = Arc::into_inner(view).unwrap();
            assert_eq!(view.position(), 0);
            assert_eq!(view.cursor_slots(), 1);
        }

        drop(to_worker);
        worker.join().unwrap();
    }

    #[test]
    fn test_clone_has_own_cursor() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("concurrent_clone.bin");
        write_reference_file(&path, 16);

        let shared = SharedPagedReader::open(&path).unwrap();
        let view = shared.view(0, 128).unwrap();
        view.seek(64).unwrap();

        let copy = view.clone();
        assert_eq!(copy.position(), 0);
        assert_eq!(copy.get_i64().unwrap(), reference(0));
        assert_eq!(view.position(), 64);

        let nested = view.view(8, 24).unwrap();
        assert_eq!((nested.start(), nested.end()), (8, 24));
        assert_eq!(nested.get_i64().unwrap(), reference(1));
        assert!(nested.get_i64_at(9).is_err());
    }

    #[test]
    fn test_thrashing_keeps_mappings_bounded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("concurrent_thrash.bin");
        write_reference_file(&path, 1024);

        let config = PageConfig::reader().with_page_size(64).with_overlap(8);
        let shared = SharedPagedReader::open_with(&path, config).unwrap();
        let view = shared.view(0, shared.len()).unwrap();

        // 交替访问相距较远的页面，每次都需要重新映射
        for i in 0..10u64 {
            assert_eq!(view.get_i64_at(0).unwrap(), reference(0));
            assert_eq!(view.get_i64_at(8000).unwrap(), reference(1000));
            assert_eq!(shared.resident_pages(), 1);
            assert_eq!(shared.maps_performed(), 2 * (i + 1));
        }
    }

    #[test]
    fn test_close_shared_reader() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("concurrent_close.bin");
        write_reference_file(&path, 16);

        let shared = SharedPagedReader::open(&path).unwrap();
        let view = shared.view(0, 128).unwrap();
        assert_eq!(view.get_i64().unwrap(), reference(0));

        shared.close();
        shared.close();
        assert!(shared.is_closed());
        assert_eq!(shared.resident_pages(), 0);
        assert!(matches!(view.get_i64().unwrap_err(), Error::Closed));
    }

    #[test]
    fn test_writer_handoff() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("concurrent_handoff.bin");

        let writer = PagedWriter::create_with(&path, tiny_pages()).unwrap();
        for i in 0..100 {
            writer.put_i64(reference(i)).unwrap();
        }
        let shared = writer.into_shared().unwrap();
        assert_eq!(shared.len(), 800);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 800);

        let view = shared.view(400, 800).unwrap();
        assert_eq!(view.get_i64().unwrap(), reference(50));
        assert!(shared.view(0, 801).is_err());
    }
}

/// SeekReader 测试
#[cfg(test)]
mod seek_reader_tests {
    use super::*;

    #[test]
    fn test_matches_paged_reader() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("seek_match.bin");

        let writer = PagedWriter::create_with(&path, tiny_pages()).unwrap();
        writer.put_i16(-300).unwrap();
        writer.put_f32(1.5).unwrap();
        writer.put_string(Some("seek")).unwrap();
        writer.put_var_i32(1 << 20).unwrap();
        writer.put_char16(0x263A).unwrap();
        drop(writer);

        let paged = PagedReader::open(&path).unwrap();
        let seek = SeekReader::open(&path).unwrap();
        assert_eq!(paged.len(), seek.len());

        assert_eq!(seek.get_i16().unwrap(), paged.get_i16().unwrap());
        assert_eq!(seek.get_f32().unwrap(), paged.get_f32().unwrap());
        assert_eq!(seek.get_string().unwrap(), paged.get_string().unwrap());
        assert_eq!(seek.get_var_i32().unwrap(), paged.get_var_i32().unwrap());
        assert_eq!(seek.get_char16().unwrap(), 0x263A);
        assert!(!seek.has_remaining());
    }

    #[test]
    fn test_view_has_synthetic_size() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("seek_view.bin");
        write_reference_file(&path, 32);

        let reader = SeekReader::open(&path).unwrap();
        let view = reader.view(80, 160).unwrap();
        assert_eq!(view.len(), 80);
        assert_eq!(view.origin(), 80);
        assert_eq!(view.get_i64().unwrap(), reference(10));
        assert_eq!(view.get_i64_at(72).unwrap(), reference(19));
        assert_eq!(view.get_i64_at(73).unwrap_err().kind(), ErrorKind::Bounds);

        // 嵌套视图的偏移相对于父视图
        let nested = view.view(8, 16).unwrap();
        assert_eq!(nested.origin(), 88);
        assert_eq!(nested.get_i64().unwrap(), reference(11));

        // 父读取器的游标不受影响
        assert_eq!(reader.position(), 0);
        assert!(reader.view(0, 257).is_err());
    }

    #[test]
    fn test_eof_and_close() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("seek_close.bin");
        write_reference_file(&path, 2);

        let mut reader = SeekReader::open(&path).unwrap();
        reader.seek(16).unwrap();
        assert!(matches!(reader.get_u8().unwrap_err(), Error::OutOfBounds { .. }));

        reader.close();
        reader.close();
        assert!(reader.is_closed());
        assert!(matches!(reader.get_i64_at(0).unwrap_err(), Error::Closed));
        assert!(matches!(reader.view(0, 8).unwrap_err(), Error::Closed));
    }
}

/// 流式反序列化测试
#[cfg(test)]
mod stream_tests {
    use super::*;

    /// 16 字节定长记录：i32 id + 4 字节填充 + f64 值
    #[derive(Debug, Default, Clone, PartialEq)]
    struct Sample {
        id: i32,
        value: f64,
    }

    impl Encode for Sample {
        fn encode_to<W: RandomAccessMut>(&self, sink: &W) -> Result<()> {
            sink.put_i32(self.id)?;
            sink.put_i32(0)?;
            sink.put_f64(self.value)
        }
    }

    impl Decode for Sample {
        fn decode_from<R: RandomAccess>(&mut self, source: &R) -> Result<()> {
            self.id = source.get_i32()?;
            source.skip(4)?;
            self.value = source.get_f64()?;
            Ok(())
        }
    }

    fn samples() -> Vec<Sample> {
        vec![
            Sample { id: 1, value: 0.5 },
            Sample { id: 2, value: -2.25 },
            Sample { id: 3, value: 1e300 },
        ]
    }

    #[test]
    fn test_end_to_end() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stream_e2e.bin");

        let mut writer = PagedWriter::create_with(&path, tiny_pages()).unwrap();
        assert_eq!(write_records(&writer, &samples()).unwrap(), 3);
        writer.close().unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 48);

        let reader = PagedReader::open(&path).unwrap();
        let mut stream = stream_records(&reader, Sample::default);
        for expected in samples() {
            assert_eq!(stream.next().unwrap().unwrap(), expected);
        }
        // 第 4 条记录：流已耗尽，而不是返回垃圾数据
        assert!(stream.next().is_none());
        assert!(stream.next().is_none());
        assert_eq!(reader.get_i32().unwrap_err().kind(), ErrorKind::Bounds);
    }

    #[test]
    fn test_truncated_tail_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stream_tail.bin");

        let writer = PagedWriter::create(&path).unwrap();
        write_records(&writer, &samples()).unwrap();
        writer.put_i32(99).unwrap();

        let reader = writer.into_reader().unwrap();
        let results: Vec<_> = stream_records(&reader, Sample::default).collect();
        assert_eq!(results.len(), 4);
        assert!(results[..3].iter().all(|r| r.is_ok()));
        assert_eq!(results[3].as_ref().unwrap_err().kind(), ErrorKind::Bounds);
    }

    #[test]
    fn test_stream_over_views() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stream_views.bin");

        let writer = PagedWriter::create(&path).unwrap();
        write_records(&writer, &samples()).unwrap();
        let reader = writer.into_reader().unwrap();

        // 只流式读取中间那条记录
        let middle = reader.view(16, 32).unwrap();
        let records: Vec<Sample> = stream_records(&middle, Sample::default).collect::<Result<_>>().unwrap();
        assert_eq!(records, vec![samples()[1].clone()]);

        // 并发视图同样适用
        let shared = reader.into_shared().unwrap();
        let view = shared.view(0, shared.len()).unwrap();
        let records: Vec<Sample> = stream_records(&view, Sample::default).collect::<Result<_>>().unwrap();
        assert_eq!(records, samples());
    }

    #[test]
    fn test_empty_source() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stream_empty.bin");
        std::fs::File::create(&path).unwrap();

        let reader = SeekReader::open(&path).unwrap();
        assert_eq!(stream_records(&reader, Sample::default).count(), 0);
    }
}

/// 基于 proptest 的往返测试
#[cfg(test)]
mod round_trip_props {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// 在随机偏移写入随机值（极小页面下会跨页），读回应完全一致
        #[test]
        fn prop_scattered_writes(values in proptest::collection::vec((0u64..2000, any::<i64>(), any::<f64>()), 1..40)) {
            let dir = tempdir().unwrap();
            let path = dir.path().join("prop_scatter.bin");
            let writer = PagedWriter::create_with(&path, tiny_pages()).unwrap();

            // 槽位间隔 24 字节，错位后的 16 字节记录互不重叠
            let mut expected = std::collections::BTreeMap::new();
            for &(slot, long, double) in &values {
                let offset = slot * 24 + (slot % 7);
                writer.put_i64_at(offset, long).unwrap();
                writer.put_f64_at(offset + 8, double).unwrap();
                expected.insert(offset, (long, double));
            }
            let max = expected.keys().max().copied().unwrap() + 16;
            prop_assert_eq!(writer.len(), max);

            let reader = writer.into_reader_with(PageConfig::reader().with_page_size(64).with_overlap(8)).unwrap();
            prop_assert_eq!(reader.len(), max);
            for (offset, (long, double)) in expected {
                prop_assert_eq!(reader.get_i64_at(offset).unwrap(), long);
                prop_assert_eq!(reader.get_f64_at(offset + 8).unwrap().to_bits(), double.to_bits());
            }
        }

        /// 随机 ASCII 字符串往返
        #[test]
        fn prop_ascii_strings(strings in proptest::collection::vec(proptest::option::of("[ -~]{0,80}"), 0..20)) {
            let dir = tempdir().unwrap();
            let path = dir.path().join("prop_strings.bin");
            let writer = PagedWriter::create_with(&path, tiny_pages()).unwrap();
            for s in &strings {
                writer.put_string(s.as_deref()).unwrap();
            }

            let reader = writer.into_reader().unwrap();
            for s in &strings {
                prop_assert_eq!(&reader.get_string().unwrap(), s);
            }
            prop_assert!(!reader.has_remaining());
        }
    }
}
