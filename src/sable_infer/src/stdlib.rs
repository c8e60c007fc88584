// The embedded core library: enough of the standard surface, with sigs,
// for dispatch and the refinement predicates to work. Ingested through the
// ordinary parse+index pipeline as a Payload file.

pub const STDLIB_SOURCE: &str = r#"# typed: strict
class BasicObject
  sig { params(other: BasicObject).returns(T::Boolean) }
  def ==(other)
    true
  end

  sig { params(other: BasicObject).returns(T::Boolean) }
  def !=(other)
    true
  end

  sig { returns(T::Boolean) }
  def !
    false
  end
end

class Object
  sig { returns(T::Boolean) }
  def nil?
    false
  end

  sig { params(klass: T.untyped).returns(T::Boolean) }
  def is_a?(klass)
    true
  end

  sig { params(klass: T.untyped).returns(T::Boolean) }
  def kind_of?(klass)
    is_a?(klass)
  end

  sig { returns(T.self_type) }
  def itself
    self
  end

  sig { returns(String) }
  def to_s
    ""
  end

  sig { returns(String) }
  def inspect
    ""
  end

  sig { params(message: T.untyped).returns(NilClass) }
  def puts(message = nil)
    nil
  end

  sig { params(message: T.untyped).returns(T.noreturn) }
  def raise(message = nil)
    raise(message)
  end
end

class Integer
  sig { params(other: Integer).returns(Integer) }
  def +(other)
    0
  end

  sig { params(other: Integer).returns(Integer) }
  def -(other)
    0
  end

  sig { params(other: Integer).returns(Integer) }
  def *(other)
    0
  end

  sig { params(other: Integer).returns(Integer) }
  def /(other)
    0
  end

  sig { params(other: Integer).returns(Integer) }
  def %(other)
    0
  end

  sig { returns(Integer) }
  def -@
    0
  end

  sig { params(other: Integer).returns(T::Boolean) }
  def <(other)
    true
  end

  sig { params(other: Integer).returns(T::Boolean) }
  def <=(other)
    true
  end

  sig { params(other: Integer).returns(T::Boolean) }
  def >(other)
    true
  end

  sig { params(other: Integer).returns(T::Boolean) }
  def >=(other)
    true
  end

  sig { returns(T::Boolean) }
  def zero?
    true
  end

  sig { returns(Integer) }
  def succ
    0
  end

  sig { returns(Float) }
  def to_f
    0.0
  end
end

class Float
  sig { params(other: Float).returns(Float) }
  def +(other)
    0.0
  end

  sig { params(other: Float).returns(Float) }
  def -(other)
    0.0
  end

  sig { params(other: Float).returns(Float) }
  def *(other)
    0.0
  end

  sig { params(other: Float).returns(Float) }
  def /(other)
    0.0
  end

  sig { returns(Float) }
  def -@
    0.0
  end

  sig { params(other: Float).returns(T::Boolean) }
  def <(other)
    true
  end

  sig { params(other: Float).returns(T::Boolean) }
  def >(other)
    true
  end

  sig { returns(Integer) }
  def to_i
    0
  end
end

class String
  sig { params(other: String).returns(String) }
  def +(other)
    ""
  end

  sig { returns(Integer) }
  def length
    0
  end

  sig { returns(Integer) }
  def size
    0
  end

  sig { returns(T::Boolean) }
  def empty?
    true
  end

  sig { returns(String) }
  def upcase
    ""
  end

  sig { returns(String) }
  def downcase
    ""
  end

  sig { returns(String) }
  def strip
    ""
  end
end

class Symbol
  sig { returns(String) }
  def to_s
    ""
  end
end

class NilClass
  sig { returns(T::Boolean) }
  def nil?
    true
  end

  sig { returns(String) }
  def to_s
    ""
  end
end

class Array
  sig { returns(Integer) }
  def size
    0
  end

  sig { returns(Integer) }
  def length
    0
  end

  sig { returns(T::Boolean) }
  def empty?
    true
  end

  sig { returns(T.nilable(Elem)) }
  def first
    nil
  end

  sig { returns(T.nilable(Elem)) }
  def last
    nil
  end
end

class Hash
  sig { returns(Integer) }
  def size
    0
  end

  sig { returns(T::Boolean) }
  def empty?
    true
  end
end

class StandardError
  sig { returns(String) }
  def message
    ""
  end
end
"#;
